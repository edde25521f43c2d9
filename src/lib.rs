pub mod app;
pub mod app_state;
pub mod camera;
pub mod config;
pub mod constants;
pub mod error;
mod gemini;
pub mod image_processor;
pub mod report;

use std::future::Future;

use log::{debug, error, info};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use url::Url;

pub use crate::{
    app::MealApp,
    app_state::{AppState, Phase, RequestToken},
    camera::CameraSession,
    config::ClientConfig,
    error::{AnalysisError, CameraError, InputError},
    image_processor::{ImageAcquirer, ImagePayload, MediaType, Preview},
};
use crate::{constants::*, gemini::*};

/// Estimated nutrition facts for one photo.
///
/// Serialized with the field names the model is instructed to return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionResult {
    #[serde(rename = "foodName")]
    pub subject_label: String,
    /// kcal
    pub calories: f64,
    /// Grams.
    pub fat: f64,
    /// Grams.
    pub carbs: f64,
    /// Grams.
    pub protein: f64,
    #[serde(rename = "description")]
    pub summary: String,
    #[serde(rename = "isFood")]
    pub is_food_detected: bool,
}

impl NutritionResult {
    fn check_non_negative(&self) -> Result<(), AnalysisError> {
        let fields = [
            ("calories", self.calories),
            ("fat", self.fat),
            ("carbs", self.carbs),
            ("protein", self.protein),
        ];
        match fields.iter().find(|(_, value)| !(*value >= 0.0)) {
            Some((name, value)) => Err(AnalysisError::MalformedResponse {
                reason: format!("{name} is negative ({value})"),
            }),
            None => Ok(()),
        }
    }
}

/// Something that can turn a photo into a [`NutritionResult`].
#[cfg_attr(test, mockall::automock)]
pub trait Analyzer {
    fn analyze(
        &self,
        image: ImagePayload,
    ) -> impl Future<Output = Result<NutritionResult, AnalysisError>> + Send;
}

impl<A: Analyzer> Analyzer for &A {
    fn analyze(
        &self,
        image: ImagePayload,
    ) -> impl Future<Output = Result<NutritionResult, AnalysisError>> + Send {
        (**self).analyze(image)
    }
}

// --- Client Implementation ---

/// Client for the hosted inference service.
///
/// Build one per process and share it by reference.
#[derive(Debug)]
pub struct MealClient {
    client: reqwest::Client,
    config: ClientConfig,
    endpoint: Url,
}

impl MealClient {
    pub fn new(config: ClientConfig) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(AnalysisError::ClientBuild)?;
        let endpoint = config.endpoint()?;

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    pub fn from_env() -> Result<Self, AnalysisError> {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn send_request(&self, image: ImagePayload) -> Result<NutritionResult, AnalysisError> {
        let api_key = self
            .config
            .credential()
            .ok_or(AnalysisError::MissingCredential)?;

        info!(
            "Analyzing {} ({}, {} bytes) with {}",
            image.file_name(),
            image.media_type(),
            image.len(),
            self.config.model
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.media_type().as_mime().to_string(),
                            data: image.to_base64(),
                        },
                    },
                    Part::Text {
                        text: ANALYSIS_PROMPT.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: nutrition_schema(),
            },
        };
        drop(image);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key).map_err(|_| AnalysisError::InvalidCredential)?,
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(headers)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("Analysis service returned {}: {}", status, body);
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            return Err(AnalysisError::Service { status, message });
        }

        parse_response(&body)
    }
}

impl Analyzer for MealClient {
    fn analyze(
        &self,
        image: ImagePayload,
    ) -> impl Future<Output = Result<NutritionResult, AnalysisError>> + Send {
        self.send_request(image)
    }
}

// --- Parsing Logic ---

fn parse_response(body: &str) -> Result<NutritionResult, AnalysisError> {
    if body.trim().is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }

    let envelope: GenerateContentResponse = serde_json::from_str(body).map_err(|e| {
        error!("Failed to decode service envelope: {}: {}", e, body);
        AnalysisError::MalformedResponse {
            reason: e.to_string(),
        }
    })?;

    let text = envelope.text().ok_or(AnalysisError::EmptyResponse)?;
    debug!("Model returned {} bytes of text", text.len());

    let result: NutritionResult = serde_json::from_str(&text).map_err(|e| {
        error!("Failed to parse JSON response: {}: {}", e, text);
        AnalysisError::MalformedResponse {
            reason: e.to_string(),
        }
    })?;
    result.check_non_negative().inspect_err(|e| {
        error!("Rejected nutrition values: {:?}: {}", e, text);
    })?;

    Ok(result)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope(text: &str) -> String {
        json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        })
        .to_string()
    }

    fn chicken_salad() -> String {
        json!({
            "foodName": "Grilled Chicken Salad",
            "calories": 420,
            "fat": 18,
            "carbs": 12,
            "protein": 45,
            "description": "A lean, protein-rich meal.",
            "isFood": true
        })
        .to_string()
    }

    #[test]
    fn parses_canned_result_exactly() {
        let result = parse_response(&envelope(&chicken_salad())).unwrap();
        assert_eq!(
            result,
            NutritionResult {
                subject_label: "Grilled Chicken Salad".into(),
                calories: 420.0,
                fat: 18.0,
                carbs: 12.0,
                protein: 45.0,
                summary: "A lean, protein-rich meal.".into(),
                is_food_detected: true,
            }
        );
    }

    #[test]
    fn non_food_is_a_successful_result() {
        let text = json!({
            "foodName": "", "calories": 0, "fat": 0, "carbs": 0, "protein": 0,
            "description": "", "isFood": false
        })
        .to_string();
        let result = parse_response(&envelope(&text)).unwrap();
        assert!(!result.is_food_detected);
    }

    #[test]
    fn text_that_is_not_json_is_malformed() {
        let err = parse_response(&envelope("not json")).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse { .. }));
        assert_eq!(err.to_string(), "Failed to parse nutritional data.");
    }

    #[test]
    fn envelope_that_is_not_json_is_malformed() {
        let err = parse_response("not json").unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse { .. }));
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let text = json!({
            "foodName": "Toast", "calories": 80, "fat": 1, "carbs": 15,
            "description": "Bread.", "isFood": true
        })
        .to_string();
        let err = parse_response(&envelope(&text)).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse { reason } if reason.contains("protein")));
    }

    #[test]
    fn wrongly_typed_field_is_malformed() {
        let text = json!({
            "foodName": "Toast", "calories": "eighty", "fat": 1, "carbs": 15, "protein": 3,
            "description": "Bread.", "isFood": true
        })
        .to_string();
        assert!(matches!(
            parse_response(&envelope(&text)),
            Err(AnalysisError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn negative_macro_is_malformed() {
        let text = json!({
            "foodName": "Soup", "calories": 120, "fat": -2, "carbs": 10, "protein": 4,
            "description": "Broth.", "isFood": true
        })
        .to_string();
        let err = parse_response(&envelope(&text)).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse { reason } if reason.starts_with("fat")));
    }

    #[test]
    fn empty_body_or_candidates_is_empty_response() {
        assert!(matches!(parse_response(""), Err(AnalysisError::EmptyResponse)));
        assert!(matches!(
            parse_response(r#"{"candidates":[]}"#),
            Err(AnalysisError::EmptyResponse)
        ));
        assert!(matches!(
            parse_response(&envelope("")),
            Err(AnalysisError::EmptyResponse)
        ));
    }

    #[test]
    fn unusable_user_agent_fails_client_construction() {
        let config = ClientConfig::new(Some("test-key".into())).with_user_agent("bad\nagent");
        let err = MealClient::new(config).unwrap_err();
        assert!(matches!(err, AnalysisError::ClientBuild(_)));
    }

    #[test]
    fn client_keeps_its_config() {
        let config = ClientConfig::new(None).with_model("gemini-test");
        let client = MealClient::new(config).unwrap();
        assert_eq!(client.config().model, "gemini-test");
        assert_eq!(client.config().user_agent, DEFAULT_USER_AGENT);
    }
}
