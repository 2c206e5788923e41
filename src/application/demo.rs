//! Restaurant reservation reference flow and demo tool workers.
//!
//! This is the flow served by `POST /api/sessions/demo` and exercised by
//! the end-to-end test suite.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::domain::foundation::{SessionId, ToolCallId};
use crate::ports::{ToolWorker, ToolWorkerError};

use super::orchestrator::ToolRegistry;

/// Largest party the availability check accepts.
const MAX_PARTY_SIZE: i64 = 12;

/// The reference reservation flow document.
pub fn demo_flow() -> Value {
    json!({
        "meta": {"name": "restaurant-reservation", "locale": "en-US"},
        "start": "InitialGreeting",
        "intents": {
            "BOOK": {
                "examples": [
                    "I'd like to make a reservation",
                    "book a table",
                    "can I reserve a table"
                ],
                "slots": {}
            },
            "ASK_QUESTION": {
                "examples": [
                    "what are your opening hours",
                    "do you have vegan options"
                ],
                "slots": {}
            },
            "PROVIDE_PARTY_SIZE": {
                "examples": ["we are 4 people", "party of 6", "just 2 of us"],
                "slots": {"partySize": "number"}
            },
            "PROVIDE_DATETIME": {
                "examples": [
                    "tomorrow at 7pm",
                    "next friday at 8pm",
                    "on 2025-05-01 at 19:00"
                ],
                "slots": {"date": "date", "time": "time"}
            },
            "PROVIDE_CONTACT": {
                "examples": ["my name is John Doe, phone 555-1234"],
                "slots": {"name": "name", "phone": "phone"}
            }
        },
        "tools": {
            "CheckAvailability": {
                "args": {"date": "string", "time": "string", "partySize": "number"},
                "result": {"ok": "boolean"},
                "timeout_ms": 10000
            },
            "CreateReservation": {
                "args": {
                    "date": "string",
                    "time": "string",
                    "partySize": "number",
                    "contact": "object"
                },
                "result": {"reservationId": "string"},
                "timeout_ms": 10000
            }
        },
        "states": {
            "InitialGreeting": {
                "onEnter": [
                    {"ask": "Hi! Welcome to The Rusty Spoon. How can I help you today?"}
                ],
                "transitions": [
                    {"onIntent": "BOOK", "to": "CollectPartySize"},
                    {"onIntent": "ASK_QUESTION", "to": "InitialGreeting"}
                ]
            },
            "CollectPartySize": {
                "onEnter": [
                    {"ask": "How many people will be joining us?"}
                ],
                "transitions": [
                    {
                        "onIntent": "PROVIDE_PARTY_SIZE",
                        "assign": {"partySize": "{{slot.partySize}}"},
                        "branch": [
                            {"when": "{{ctx.partySize}} > 8", "to": "TransferToManager"},
                            {"when": "else", "to": "CollectReservationDateTime"}
                        ]
                    }
                ]
            },
            "TransferToManager": {
                "onEnter": [
                    {"say": "For a party that size, let me hand you over to our manager."},
                    {"transfer": "+15551234567"}
                ],
                "transitions": []
            },
            "CollectReservationDateTime": {
                "onEnter": [
                    {"ask": "What date and time would you like?"}
                ],
                "transitions": [
                    {
                        "onIntent": "PROVIDE_DATETIME",
                        "assign": {"date": "{{slot.date}}", "time": "{{slot.time}}"},
                        "to": "ConfirmAvailability"
                    }
                ]
            },
            "ConfirmAvailability": {
                "onEnter": [
                    {"say": "Let me check availability for {{ctx.partySize}} on {{ctx.date}} at {{ctx.time}}."},
                    {"tool": {
                        "name": "CheckAvailability",
                        "args": {
                            "date": "{{ctx.date}}",
                            "time": "{{ctx.time}}",
                            "partySize": "{{ctx.partySize}}"
                        }
                    }}
                ],
                "transitions": [
                    {
                        "onToolResult": "CheckAvailability",
                        "when": "{{tool.ok}} == true",
                        "to": "CollectContactInformation"
                    },
                    {
                        "onToolResult": "CheckAvailability",
                        "to": "AltDateTime"
                    }
                ]
            },
            "AltDateTime": {
                "onEnter": [
                    {"ask": "That slot isn't available, I'm afraid. Is there another date and time that works?"}
                ],
                "transitions": [
                    {
                        "onIntent": "PROVIDE_DATETIME",
                        "assign": {"date": "{{slot.date}}", "time": "{{slot.time}}"},
                        "to": "ConfirmAvailability"
                    }
                ]
            },
            "CollectContactInformation": {
                "onEnter": [
                    {"ask": "Great, that slot works! Can I get a name and phone number for the booking?"}
                ],
                "transitions": [
                    {
                        "onIntent": "PROVIDE_CONTACT",
                        "assign": {
                            "contact.name": "{{slot.name}}",
                            "contact.phone": "{{slot.phone}}"
                        },
                        "to": "CreateBooking"
                    }
                ]
            },
            "CreateBooking": {
                "onEnter": [
                    {"tool": {
                        "name": "CreateReservation",
                        "args": {
                            "date": "{{ctx.date}}",
                            "time": "{{ctx.time}}",
                            "partySize": "{{ctx.partySize}}",
                            "contact": {
                                "name": "{{ctx.contact.name}}",
                                "phone": "{{ctx.contact.phone}}"
                            }
                        }
                    }}
                ],
                "transitions": [
                    {
                        "onToolResult": "CreateReservation",
                        "assign": {"reservationId": "{{tool.reservationId}}"},
                        "to": "Goodbye"
                    }
                ]
            },
            "Goodbye": {
                "onEnter": [
                    {"say": "You're all set! Your confirmation number is {{ctx.reservationId}}. See you soon!"},
                    {"hangup": true}
                ],
                "transitions": []
            }
        }
    })
}

/// Availability check: full above [`MAX_PARTY_SIZE`], otherwise open.
pub struct CheckAvailabilityWorker;

#[async_trait]
impl ToolWorker for CheckAvailabilityWorker {
    async fn execute(
        &self,
        _session_id: &SessionId,
        _tool_call_id: &ToolCallId,
        args: &Value,
    ) -> Result<Value, ToolWorkerError> {
        let party_size = args
            .get("partySize")
            .and_then(Value::as_i64)
            .ok_or_else(|| ToolWorkerError::new("partySize is required"))?;
        Ok(json!({"ok": party_size <= MAX_PARTY_SIZE}))
    }
}

/// Booking creation: hands out a short confirmation number.
pub struct CreateReservationWorker;

#[async_trait]
impl ToolWorker for CreateReservationWorker {
    async fn execute(
        &self,
        _session_id: &SessionId,
        tool_call_id: &ToolCallId,
        _args: &Value,
    ) -> Result<Value, ToolWorkerError> {
        let suffix = tool_call_id
            .to_string()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(8)
            .collect::<String>()
            .to_uppercase();
        Ok(json!({"reservationId": format!("RES-{}", suffix)}))
    }
}

/// Registers the demo workers. Called once at startup.
pub fn register_demo_tools(registry: &ToolRegistry) {
    registry.register("CheckAvailability", Arc::new(CheckAvailabilityWorker));
    registry.register("CreateReservation", Arc::new(CreateReservationWorker));
}
