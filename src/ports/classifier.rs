//! IntentClassifier port - Contract for turning user text into intents.
//!
//! The engine is correct under any implementation that returns an intent
//! name, a confidence in `[0, 1]`, and extracted slots. Low confidence is
//! a valid output and does not short-circuit transition matching; only
//! declared `when` guards do.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::flow::IntentDef;
use crate::domain::session::Classification;

/// Errors surfaced by classifier implementations.
///
/// Callers treat these as recoverable: a failing remote classifier falls
/// back to the deterministic pattern classifier for the same request.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    #[error("Classifier returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Port for intent classification.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classifies user text against the flow's intent catalog.
    ///
    /// # Arguments
    ///
    /// * `text` - Raw user utterance
    /// * `intents` - The bound flow's intent catalog
    /// * `context` - Current session context, available as a hint
    async fn classify(
        &self,
        text: &str,
        intents: &BTreeMap<String, IntentDef>,
        context: &Value,
    ) -> Result<Classification, ClassifierError>;
}
