//! Mutable per-session state record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::foundation::{SessionId, Timestamp, ToolCallId};

/// Classified user input: intent name, confidence, and typed slots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub name: String,
    pub confidence: f64,
    #[serde(default)]
    pub slots: Value,
}

impl Classification {
    /// Creates a classification with empty slots.
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence,
            slots: Value::Object(Map::new()),
        }
    }

    /// Attaches extracted slots.
    pub fn with_slots(mut self, slots: Value) -> Self {
        self.slots = slots;
        self
    }
}

/// Record of an issued tool call awaiting its result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRecord {
    pub id: ToolCallId,
    pub name: String,
    pub args: Value,
    pub timestamp: Timestamp,
}

/// Record of the most recent tool result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResultRecord {
    pub call_id: ToolCallId,
    pub result: Value,
    pub timestamp: Timestamp,
}

/// The mutable state of one dialog session.
///
/// `current_state` is always a key of the bound flow's states map; the
/// orchestrator only moves it through validated transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub session_id: SessionId,
    pub current_state: String,
    pub context: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_intent: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tool_call: Option<ToolCallRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tool_result: Option<ToolResultRecord>,
}

impl SessionState {
    /// Fresh state positioned at the flow's start with an empty context.
    pub fn new(session_id: SessionId, start_state: impl Into<String>) -> Self {
        Self {
            session_id,
            current_state: start_state.into(),
            context: Value::Object(Map::new()),
            last_intent: None,
            last_tool_call: None,
            last_tool_result: None,
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_session_starts_with_empty_context() {
        let state = SessionState::new(SessionId::new(), "InitialGreeting");
        assert_eq!(state.current_state, "InitialGreeting");
        assert_eq!(state.context, json!({}));
        assert!(state.last_intent.is_none());
    }

    #[test]
    fn tool_records_round_trip_with_correlated_ids() {
        let mut state = SessionState::new(SessionId::new(), "A");
        let call_id = ToolCallId::new();

        state.last_tool_call = Some(ToolCallRecord {
            id: call_id,
            name: "CheckAvailability".into(),
            args: json!({}),
            timestamp: Timestamp::now(),
        });
        state.last_tool_result = Some(ToolResultRecord {
            call_id,
            result: json!({"ok": true}),
            timestamp: Timestamp::now(),
        });

        let json = serde_json::to_string(&state).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.last_tool_call.unwrap().id, call_id);
        assert_eq!(back.last_tool_result.unwrap().call_id, call_id);
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = SessionState::new(SessionId::new(), "A");
        state.last_intent = Some(Classification::new("BOOK", 0.9).with_slots(json!({"n": 4})));

        let json = serde_json::to_string(&state).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}
