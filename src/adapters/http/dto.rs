//! Request and response bodies for the REST surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::DomainError;
use crate::domain::session::EventEnvelope;
use crate::ports::FlowRecord;

/// Uniform error body for all REST failures.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<DomainError> for ErrorResponse {
    fn from(err: DomainError) -> Self {
        let details = (!err.details.is_empty())
            .then(|| serde_json::to_value(&err.details).unwrap_or_default());
        Self {
            code: err.code.to_string(),
            message: err.message,
            details,
        }
    }
}

impl ErrorResponse {
    /// 400-style error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".into(),
            message: message.into(),
            details: None,
        }
    }

    /// Flow validation failure with the validator's findings attached.
    pub fn invalid_flow(message: impl Into<String>) -> Self {
        Self {
            code: "INVALID_FLOW".into(),
            message: message.into(),
            details: None,
        }
    }

    /// 404-style error.
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self {
            code: "NOT_FOUND".into(),
            message: format!("{} not found: {}", entity, id),
            details: None,
        }
    }

    /// 500-style error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: "INTERNAL_ERROR".into(),
            message: message.into(),
            details: None,
        }
    }
}

// ============================================
// Sessions
// ============================================

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub flow: Value,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DemoSessionResponse {
    pub session_id: String,
    pub flow_name: String,
}

#[derive(Debug, Deserialize)]
pub struct InputRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn new() -> Self {
        Self { ok: true }
    }
}

impl Default for OkResponse {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<EventEnvelope>,
}

// ============================================
// Flow info (visualization)
// ============================================

#[derive(Debug, Deserialize)]
pub struct FlowInfoQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FlowInfoState {
    pub name: String,
    pub terminal: bool,
    pub targets: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FlowInfoSession {
    pub session_id: String,
    pub current_state: String,
    pub context: Value,
}

#[derive(Debug, Serialize)]
pub struct FlowInfoResponse {
    pub meta: Value,
    pub start: String,
    pub states: Vec<FlowInfoState>,
    pub intents: Vec<String>,
    pub tools: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<FlowInfoSession>,
}

// ============================================
// Flow CRUD
// ============================================

#[derive(Debug, Deserialize)]
pub struct SaveFlowRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub definition: Value,
}

#[derive(Debug, Deserialize)]
pub struct ValidateFlowRequest {
    pub definition: Value,
}

#[derive(Debug, Serialize)]
pub struct ValidateFlowResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FlowRecordResponse {
    pub id: String,
    pub name: String,
    pub version: u32,
    pub published: bool,
    pub definition: Value,
    pub created_at: String,
    pub updated_at: String,
}

impl From<FlowRecord> for FlowRecordResponse {
    fn from(record: FlowRecord) -> Self {
        Self {
            id: record.id.to_string(),
            name: record.name,
            version: record.version,
            published: record.published,
            definition: record.definition,
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

// ============================================
// Health
// ============================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub uptime_secs: u64,
}
