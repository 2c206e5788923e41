//! Classifier configuration

use serde::Deserialize;

use super::error::ConfigValidationError;

/// Remote classifier configuration.
///
/// When `api_url` is absent the engine uses the deterministic pattern
/// classifier; classification never depends on an external service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifierConfig {
    /// Remote classification endpoint
    #[serde(default)]
    pub api_url: Option<String>,

    /// Bearer credential for the remote endpoint
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ClassifierConfig {
    /// True when a remote classifier is configured.
    pub fn is_remote(&self) -> bool {
        self.api_url.is_some()
    }

    /// Validates classifier configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if let Some(url) = &self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigValidationError::InvalidClassifierUrl);
            }
        }
        Ok(())
    }
}
