//! Remote HTTP classifier with deterministic fallback.
//!
//! Posts the utterance, intent catalog, and context to an external
//! classification service. Any transport or decode failure falls back to
//! the pattern classifier for the same request; classification is never
//! fatal to the session.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::domain::flow::IntentDef;
use crate::domain::session::Classification;
use crate::ports::{ClassifierError, IntentClassifier};

use super::pattern::PatternClassifier;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
    intents: &'a BTreeMap<String, IntentDef>,
    context: &'a Value,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    intent: String,
    confidence: f64,
    #[serde(default)]
    slots: Value,
}

/// Classifier backed by an external HTTP service.
pub struct RemoteClassifier {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    fallback: PatternClassifier,
}

impl RemoteClassifier {
    /// Creates a remote classifier for the given endpoint.
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_url: api_url.into(),
            api_key,
            fallback: PatternClassifier::new(),
        }
    }

    async fn call_remote(
        &self,
        text: &str,
        intents: &BTreeMap<String, IntentDef>,
        context: &Value,
    ) -> Result<Classification, ClassifierError> {
        let mut request = self.http.post(&self.api_url).json(&ClassifyRequest {
            text,
            intents,
            context,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        let body: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;

        if !intents.contains_key(&body.intent) {
            return Err(ClassifierError::InvalidResponse(format!(
                "intent '{}' is not in the catalog",
                body.intent
            )));
        }

        Ok(
            Classification::new(body.intent, body.confidence.clamp(0.0, 1.0))
                .with_slots(body.slots),
        )
    }
}

#[async_trait]
impl IntentClassifier for RemoteClassifier {
    async fn classify(
        &self,
        text: &str,
        intents: &BTreeMap<String, IntentDef>,
        context: &Value,
    ) -> Result<Classification, ClassifierError> {
        match self.call_remote(text, intents, context).await {
            Ok(classification) => Ok(classification),
            Err(e) => {
                tracing::warn!(error = %e, "Remote classifier failed, using pattern fallback");
                self.fallback.classify(text, intents, context).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unreachable_endpoint_falls_back_to_pattern() {
        let classifier = RemoteClassifier::new("http://127.0.0.1:1/classify", None);
        let intents: BTreeMap<String, IntentDef> = serde_json::from_value(json!({
            "BOOK": {"examples": ["book a table"], "slots": {}}
        }))
        .unwrap();

        let result = classifier
            .classify("book a table", &intents, &json!({}))
            .await
            .unwrap();
        assert_eq!(result.name, "BOOK");
    }
}
