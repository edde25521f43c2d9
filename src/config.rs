use std::{env, time::Duration};

use url::Url;

use crate::{constants::*, error::AnalysisError};

/// Settings for [`crate::MealClient`].
///
/// Only the credential comes from the environment; everything else has a
/// default and can be overridden by the caller.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Url,
    pub timeout: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: Url::parse(GEMINI_API_BASE_URL).expect("default base URL is valid"),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Reads the credential from `API_KEY`.
    pub fn from_env() -> Self {
        Self::new(env::var(API_KEY_ENV).ok())
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, AnalysisError> {
        self.base_url =
            Url::parse(base_url).map_err(|e| AnalysisError::InvalidBaseUrl(e.to_string()))?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// The credential, if one is set and not blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub(crate) fn endpoint(&self) -> Result<Url, AnalysisError> {
        let method = format!("{}:generateContent", self.model);
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AnalysisError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["v1beta", "models", method.as_str()]);
        Ok(url)
    }
}
