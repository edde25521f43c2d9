//! Wire types for the Gemini `generateContent` REST call.

use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub(crate) struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum Part {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponsePart {
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, all text parts joined.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
}

/// Schema the model must follow; every field is required.
pub(crate) fn nutrition_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "foodName": {
                "type": "STRING",
                "description": "A short, descriptive name of the dish or meal."
            },
            "calories": {
                "type": "NUMBER",
                "description": "Total estimated calories (kcal)."
            },
            "fat": {
                "type": "NUMBER",
                "description": "Total fat in grams."
            },
            "carbs": {
                "type": "NUMBER",
                "description": "Total carbohydrates in grams."
            },
            "protein": {
                "type": "NUMBER",
                "description": "Total protein in grams."
            },
            "description": {
                "type": "STRING",
                "description": "A brief, one-sentence summary of the meal's nutritional profile."
            },
            "isFood": {
                "type": "BOOLEAN",
                "description": "True if the image contains food, false otherwise."
            }
        },
        "required": ["foodName", "calories", "fat", "carbs", "protein", "description", "isFood"]
    })
}
