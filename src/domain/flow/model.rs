//! Flow configuration model.
//!
//! These types are the normalized, in-memory form of the authored flow
//! document. Actions and transitions are discriminated variants, not class
//! hierarchies; the orchestrator inspects them structurally.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Default tool timeout when a tool definition does not override it.
pub const DEFAULT_TOOL_TIMEOUT_MS: u64 = 30_000;

/// Human-facing flow metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

/// Immutable flow description bound to a session for its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowConfig {
    pub meta: FlowMeta,
    pub start: String,
    #[serde(default)]
    pub intents: BTreeMap<String, IntentDef>,
    #[serde(default)]
    pub tools: BTreeMap<String, ToolDef>,
    #[serde(default)]
    pub states: BTreeMap<String, StateDef>,
}

impl FlowConfig {
    /// Looks up a state definition by name.
    pub fn state(&self, name: &str) -> Option<&StateDef> {
        self.states.get(name)
    }

    /// Effective timeout for a tool, falling back to the engine default.
    pub fn tool_timeout(&self, tool: &str) -> Duration {
        let ms = self
            .tools
            .get(tool)
            .and_then(|def| def.timeout_ms_value())
            .unwrap_or(DEFAULT_TOOL_TIMEOUT_MS);
        Duration::from_millis(ms)
    }
}

/// Declared intent with classifier examples and typed slots.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IntentDef {
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub slots: BTreeMap<String, SlotType>,
}

/// Slot value types the classifier knows how to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotType {
    Number,
    Date,
    Time,
    Name,
    Phone,
    String,
}

/// Declared tool with argument/result schemas and an optional timeout.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolDef {
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub args: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub result: Value,
    /// Kept as raw JSON so the validator can report non-numeric values
    /// instead of failing the whole parse.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<Value>,
}

impl ToolDef {
    /// The timeout in milliseconds, when present and numeric.
    pub fn timeout_ms_value(&self) -> Option<u64> {
        self.timeout_ms.as_ref().and_then(Value::as_u64)
    }
}

/// A node in the flow graph: ordered entry actions plus ordered transitions.
///
/// A state with no transitions is terminal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StateDef {
    #[serde(default, rename = "onEnter")]
    pub on_enter: Vec<Action>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

impl StateDef {
    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        self.transitions.is_empty()
    }

    /// The first `ask` action of this state, used for soft re-prompts.
    pub fn ask_action(&self) -> Option<&Action> {
        self.on_enter
            .iter()
            .find(|action| matches!(action, Action::Ask { .. }))
    }
}

/// One presentation or side-effect step executed on state entry.
///
/// Serialized in the authored single-key object form: `{"say": "..."}`,
/// `{"tool": {"name": "...", "args": {...}}}`, `{"hangup": true}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Say { text: String },
    Ask { text: String },
    Transfer { target: String },
    Hangup,
    Tool { name: String, args: Value },
}

const ACTION_KEYS: [&str; 5] = ["say", "ask", "transfer", "hangup", "tool"];

impl Action {
    /// Parses the authored single-key object form.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        if let Some(s) = value.as_str() {
            if s == "hangup" {
                return Ok(Action::Hangup);
            }
            return Err(format!("unknown action '{}'", s));
        }

        let map = value
            .as_object()
            .ok_or_else(|| "action must be an object".to_string())?;

        let present: Vec<&str> = ACTION_KEYS
            .iter()
            .copied()
            .filter(|key| map.contains_key(*key))
            .collect();
        if present.len() != 1 {
            return Err(format!(
                "action must contain exactly one of say, ask, transfer, hangup, tool (found {})",
                present.len()
            ));
        }

        let key = present[0];
        let body = &map[key];
        match key {
            "say" => Ok(Action::Say {
                text: expect_string(body, "say")?,
            }),
            "ask" => Ok(Action::Ask {
                text: expect_string(body, "ask")?,
            }),
            "transfer" => Ok(Action::Transfer {
                target: expect_string(body, "transfer")?,
            }),
            "hangup" => Ok(Action::Hangup),
            "tool" => {
                let tool = body
                    .as_object()
                    .ok_or_else(|| "tool action requires an object body".to_string())?;
                let name = tool
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| "tool action requires a string 'name'".to_string())?;
                Ok(Action::Tool {
                    name: name.to_string(),
                    args: tool.get("args").cloned().unwrap_or(Value::Null),
                })
            }
            _ => unreachable!("key filtered from ACTION_KEYS"),
        }
    }

    /// Serializes back to the single-key object form.
    pub fn to_value(&self) -> Value {
        match self {
            Action::Say { text } => serde_json::json!({"say": text}),
            Action::Ask { text } => serde_json::json!({"ask": text}),
            Action::Transfer { target } => serde_json::json!({"transfer": target}),
            Action::Hangup => serde_json::json!({"hangup": true}),
            Action::Tool { name, args } => {
                serde_json::json!({"tool": {"name": name, "args": args}})
            }
        }
    }

    /// The name of the tool this action invokes, when it is a tool action.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Action::Tool { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }
}

fn expect_string(value: &Value, action: &str) -> Result<String, String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("{} action requires a string body", action))
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Action::from_value(&value).map_err(DeError::custom)
    }
}

/// Intent trigger: a single name or a set of names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum IntentMatcher {
    One(String),
    Many(Vec<String>),
}

impl IntentMatcher {
    /// String equality for the single form, set membership for the list form.
    pub fn matches(&self, intent: &str) -> bool {
        match self {
            IntentMatcher::One(name) => name == intent,
            IntentMatcher::Many(names) => names.iter().any(|name| name == intent),
        }
    }

    /// Every intent name this matcher refers to.
    pub fn names(&self) -> Vec<&str> {
        match self {
            IntentMatcher::One(name) => vec![name.as_str()],
            IntentMatcher::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Directed edge in the flow graph.
///
/// Triggered by an intent or a tool result, optionally guarded, optionally
/// assigning into the context, and targeting either a direct state or a
/// list of conditional branches. `branch` wins when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Transition {
    #[serde(default, rename = "onIntent", skip_serializing_if = "Option::is_none")]
    pub on_intent: Option<IntentMatcher>,
    #[serde(
        default,
        rename = "onToolResult",
        skip_serializing_if = "Option::is_none"
    )]
    pub on_tool_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assign: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Vec<Branch>>,
}

impl Transition {
    /// Whether this transition carries any trigger at all.
    pub fn has_trigger(&self) -> bool {
        self.on_intent.is_some() || self.on_tool_result.is_some() || self.branch.is_some()
    }

    /// Every state name this transition can land on.
    pub fn targets(&self) -> Vec<&str> {
        let mut targets = Vec::new();
        if let Some(to) = &self.to {
            targets.push(to.as_str());
        }
        if let Some(branches) = &self.branch {
            targets.extend(branches.iter().map(|b| b.to.as_str()));
        }
        targets
    }
}

/// Guarded branch target; `when: "else"` is the conventional default arm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Branch {
    pub when: String,
    pub to: String,
}
