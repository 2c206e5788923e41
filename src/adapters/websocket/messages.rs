//! WebSocket frame types.
//!
//! Server → client frames are session event envelopes serialized as-is;
//! see [`crate::domain::session::EventEnvelope`]. This module defines the
//! client → server protocol and the error frame sent for unknown input.

use serde::Deserialize;
use serde_json::json;

/// Frames a client may send.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Free-form user utterance.
    #[serde(rename = "user.text")]
    UserText { text: String },

    /// Keypad digits; classified through the same path as text.
    #[serde(rename = "user.dtmf")]
    UserDtmf { digits: String },

    /// Close this observer. The underlying session is unaffected.
    #[serde(rename = "client.cancel")]
    Cancel,
}

/// Error frame for unknown or failing client input.
pub fn error_frame(message: &str) -> String {
    json!({"type": "error", "message": message}).to_string()
}
