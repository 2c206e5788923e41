//! Session event model.
//!
//! Every observable step of a session is an event: presentation events
//! (`say`, `ask`, `transfer`, `hangup`), tool correlation events, FSM
//! bookkeeping, and error reporting. Events are appended to the session's
//! durable log and published live; the envelope carries the session id,
//! a monotonic gapless sequence number, and a timestamp.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::{SessionId, Timestamp, ToolCallId};

/// One session event, discriminated by the wire-level `type` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Synthetic greeting sent to each newly attached observer.
    #[serde(rename = "session.started")]
    SessionStarted { session_id: String },

    /// Informational speech; the engine is not waiting for input.
    #[serde(rename = "say")]
    Say { text: String },

    /// Prompting speech; the engine awaits user input.
    #[serde(rename = "ask")]
    Ask { text: String },

    #[serde(rename = "transfer")]
    Transfer { target: String },

    #[serde(rename = "hangup")]
    Hangup,

    #[serde(rename = "tool.call")]
    ToolCall {
        tool_call_id: ToolCallId,
        name: String,
        args: Value,
    },

    #[serde(rename = "tool.result")]
    ToolResult {
        tool_call_id: ToolCallId,
        result: Value,
    },

    #[serde(rename = "tool.error")]
    ToolError {
        tool_call_id: ToolCallId,
        error: String,
    },

    #[serde(rename = "fsm.transition")]
    FsmTransition { from: String, to: String },

    #[serde(rename = "state.updated")]
    StateUpdated { ctx: Value },

    #[serde(rename = "intent.unhandled")]
    IntentUnhandled {
        intent: String,
        confidence: f64,
        #[serde(rename = "currentState")]
        current_state: String,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

impl SessionEvent {
    /// The wire-level type tag.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::SessionStarted { .. } => "session.started",
            SessionEvent::Say { .. } => "say",
            SessionEvent::Ask { .. } => "ask",
            SessionEvent::Transfer { .. } => "transfer",
            SessionEvent::Hangup => "hangup",
            SessionEvent::ToolCall { .. } => "tool.call",
            SessionEvent::ToolResult { .. } => "tool.result",
            SessionEvent::ToolError { .. } => "tool.error",
            SessionEvent::FsmTransition { .. } => "fsm.transition",
            SessionEvent::StateUpdated { .. } => "state.updated",
            SessionEvent::IntentUnhandled { .. } => "intent.unhandled",
            SessionEvent::Error { .. } => "error",
        }
    }
}

/// Transport wrapper for a session event.
///
/// `seq` is assigned by the store at emission time and is strictly
/// monotonic per session with no gaps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
    pub seq: u64,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub event: SessionEvent,
}

impl EventEnvelope {
    /// Wraps an event with its session, sequence, and emission time.
    pub fn new(session_id: SessionId, seq: u64, event: SessionEvent) -> Self {
        Self {
            session_id,
            seq,
            timestamp: Timestamp::now(),
            event,
        }
    }

    /// Synthetic envelope for observer attachment; carries sequence zero
    /// so catch-up readers never confuse it with logged events.
    pub fn session_started(session_id: SessionId) -> Self {
        Self::new(
            session_id,
            0,
            SessionEvent::SessionStarted {
                session_id: session_id.to_string(),
            },
        )
    }
}
