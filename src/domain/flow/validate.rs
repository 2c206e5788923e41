//! Flow document validation.
//!
//! Validation happens at session-create and flow-update time, never during
//! a running session. Ill-formed graphs are rejected; states unreachable
//! from `start` are accepted with warnings.

use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

use super::model::FlowConfig;

/// Reasons a flow document is rejected.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FlowValidationError {
    #[error("flow is not well-formed: {0}")]
    Malformed(String),

    #[error("flow meta is missing")]
    MissingMeta,

    #[error("start state is missing")]
    MissingStart,

    #[error("flow defines no states")]
    EmptyStates,

    #[error("start state '{0}' is not defined in states")]
    StartNotInStates(String),

    #[error("state '{state}': transition targets unknown state '{target}'")]
    UnknownTargetState { state: String, target: String },

    #[error("state '{state}': transition references unknown intent '{intent}'")]
    UnknownIntent { state: String, intent: String },

    #[error("state '{state}': onEnter references unknown tool '{tool}'")]
    UnknownTool { state: String, tool: String },

    #[error("state '{state}': transition has none of onIntent, onToolResult, branch")]
    MissingTrigger { state: String },

    #[error("state '{state}': transition has neither 'to' nor 'branch'")]
    MissingTarget { state: String },

    #[error("tool '{tool}': timeout_ms must be numeric")]
    NonNumericTimeout { tool: String },
}

/// A validated, normalized flow plus non-fatal findings.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFlow {
    pub config: FlowConfig,
    pub warnings: Vec<String>,
}

/// Validates and normalizes a raw flow document.
pub fn validate_flow(doc: &Value) -> Result<ValidatedFlow, FlowValidationError> {
    let root = doc
        .as_object()
        .ok_or_else(|| FlowValidationError::Malformed("flow must be a JSON object".into()))?;

    if !root.contains_key("meta") {
        return Err(FlowValidationError::MissingMeta);
    }
    if !root.contains_key("start") {
        return Err(FlowValidationError::MissingStart);
    }

    let config: FlowConfig = serde_json::from_value(doc.clone())
        .map_err(|e| FlowValidationError::Malformed(e.to_string()))?;

    if config.states.is_empty() {
        return Err(FlowValidationError::EmptyStates);
    }
    if !config.states.contains_key(&config.start) {
        return Err(FlowValidationError::StartNotInStates(config.start.clone()));
    }

    for (tool_name, tool) in &config.tools {
        if let Some(timeout) = &tool.timeout_ms {
            if !timeout.is_number() {
                return Err(FlowValidationError::NonNumericTimeout {
                    tool: tool_name.clone(),
                });
            }
        }
    }

    for (state_name, state) in &config.states {
        for action in &state.on_enter {
            if let Some(tool) = action.tool_name() {
                if !config.tools.contains_key(tool) {
                    return Err(FlowValidationError::UnknownTool {
                        state: state_name.clone(),
                        tool: tool.to_string(),
                    });
                }
            }
        }

        for transition in &state.transitions {
            if !transition.has_trigger() {
                return Err(FlowValidationError::MissingTrigger {
                    state: state_name.clone(),
                });
            }
            if transition.to.is_none() && transition.branch.is_none() {
                return Err(FlowValidationError::MissingTarget {
                    state: state_name.clone(),
                });
            }
            if let Some(matcher) = &transition.on_intent {
                for intent in matcher.names() {
                    if !config.intents.contains_key(intent) {
                        return Err(FlowValidationError::UnknownIntent {
                            state: state_name.clone(),
                            intent: intent.to_string(),
                        });
                    }
                }
            }
            for target in transition.targets() {
                if !config.states.contains_key(target) {
                    return Err(FlowValidationError::UnknownTargetState {
                        state: state_name.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }
    }

    let warnings = unreachable_states(&config)
        .into_iter()
        .map(|state| format!("state '{}' is unreachable from start", state))
        .collect();

    Ok(ValidatedFlow { config, warnings })
}

/// Forward traversal from `start` over `to` and branch targets.
fn unreachable_states(config: &FlowConfig) -> Vec<String> {
    let mut visited: BTreeSet<&str> = BTreeSet::new();
    let mut frontier = vec![config.start.as_str()];

    while let Some(name) = frontier.pop() {
        if !visited.insert(name) {
            continue;
        }
        let Some(state) = config.states.get(name) else {
            continue;
        };
        for transition in &state.transitions {
            for target in transition.targets() {
                if !visited.contains(target) {
                    frontier.push(target);
                }
            }
        }
    }

    config
        .states
        .keys()
        .filter(|name| !visited.contains(name.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_flow() -> Value {
        json!({
            "meta": {"name": "minimal"},
            "start": "A",
            "states": {"A": {}}
        })
    }

    #[test]
    fn minimal_flow_validates() {
        let validated = validate_flow(&minimal_flow()).unwrap();
        assert_eq!(validated.config.start, "A");
        assert!(validated.warnings.is_empty());
    }

    #[test]
    fn missing_meta_is_rejected() {
        let doc = json!({"start": "A", "states": {"A": {}}});
        assert_eq!(validate_flow(&doc), Err(FlowValidationError::MissingMeta));
    }

    #[test]
    fn missing_start_is_rejected() {
        let doc = json!({"meta": {"name": "x"}, "states": {"A": {}}});
        assert_eq!(validate_flow(&doc), Err(FlowValidationError::MissingStart));
    }

    #[test]
    fn empty_states_are_rejected() {
        let doc = json!({"meta": {"name": "x"}, "start": "A", "states": {}});
        assert_eq!(validate_flow(&doc), Err(FlowValidationError::EmptyStates));
    }

    #[test]
    fn start_not_in_states_is_rejected() {
        let doc = json!({"meta": {"name": "x"}, "start": "Missing", "states": {"A": {}}});
        assert_eq!(
            validate_flow(&doc),
            Err(FlowValidationError::StartNotInStates("Missing".into()))
        );
    }

    #[test]
    fn unknown_transition_target_is_rejected() {
        let doc = json!({
            "meta": {"name": "x"},
            "start": "A",
            "intents": {"GO": {}},
            "states": {
                "A": {"transitions": [{"onIntent": "GO", "to": "Nowhere"}]}
            }
        });
        assert_eq!(
            validate_flow(&doc),
            Err(FlowValidationError::UnknownTargetState {
                state: "A".into(),
                target: "Nowhere".into()
            })
        );
    }

    #[test]
    fn unknown_branch_target_is_rejected() {
        let doc = json!({
            "meta": {"name": "x"},
            "start": "A",
            "intents": {"GO": {}},
            "states": {
                "A": {"transitions": [{
                    "onIntent": "GO",
                    "branch": [{"when": "else", "to": "Nowhere"}]
                }]}
            }
        });
        assert!(matches!(
            validate_flow(&doc),
            Err(FlowValidationError::UnknownTargetState { .. })
        ));
    }

    #[test]
    fn unknown_intent_is_rejected() {
        let doc = json!({
            "meta": {"name": "x"},
            "start": "A",
            "states": {
                "A": {"transitions": [{"onIntent": "UNDECLARED", "to": "A"}]}
            }
        });
        assert_eq!(
            validate_flow(&doc),
            Err(FlowValidationError::UnknownIntent {
                state: "A".into(),
                intent: "UNDECLARED".into()
            })
        );
    }

    #[test]
    fn unknown_tool_in_on_enter_is_rejected() {
        let doc = json!({
            "meta": {"name": "x"},
            "start": "A",
            "states": {
                "A": {"onEnter": [{"tool": {"name": "Ghost", "args": {}}}]}
            }
        });
        assert_eq!(
            validate_flow(&doc),
            Err(FlowValidationError::UnknownTool {
                state: "A".into(),
                tool: "Ghost".into()
            })
        );
    }

    #[test]
    fn multi_key_action_is_rejected() {
        let doc = json!({
            "meta": {"name": "x"},
            "start": "A",
            "states": {
                "A": {"onEnter": [{"say": "hi", "hangup": true}]}
            }
        });
        assert!(matches!(
            validate_flow(&doc),
            Err(FlowValidationError::Malformed(_))
        ));
    }

    #[test]
    fn transition_without_trigger_is_rejected() {
        let doc = json!({
            "meta": {"name": "x"},
            "start": "A",
            "states": {
                "A": {"transitions": [{"when": "else", "to": "A"}]}
            }
        });
        assert_eq!(
            validate_flow(&doc),
            Err(FlowValidationError::MissingTrigger { state: "A".into() })
        );
    }

    #[test]
    fn transition_without_target_is_rejected() {
        let doc = json!({
            "meta": {"name": "x"},
            "start": "A",
            "intents": {"GO": {}},
            "states": {
                "A": {"transitions": [{"onIntent": "GO"}]}
            }
        });
        assert_eq!(
            validate_flow(&doc),
            Err(FlowValidationError::MissingTarget { state: "A".into() })
        );
    }

    #[test]
    fn non_numeric_timeout_is_rejected() {
        let doc = json!({
            "meta": {"name": "x"},
            "start": "A",
            "tools": {"T": {"timeout_ms": "soon"}},
            "states": {"A": {}}
        });
        assert_eq!(
            validate_flow(&doc),
            Err(FlowValidationError::NonNumericTimeout { tool: "T".into() })
        );
    }

    #[test]
    fn unreachable_state_is_a_warning_not_an_error() {
        let doc = json!({
            "meta": {"name": "x"},
            "start": "A",
            "intents": {"GO": {}},
            "states": {
                "A": {"transitions": [{"onIntent": "GO", "to": "B"}]},
                "B": {},
                "Orphan": {}
            }
        });
        let validated = validate_flow(&doc).unwrap();
        assert_eq!(validated.warnings.len(), 1);
        assert!(validated.warnings[0].contains("Orphan"));
    }

    #[test]
    fn branch_targets_count_as_reachable() {
        let doc = json!({
            "meta": {"name": "x"},
            "start": "A",
            "intents": {"GO": {}},
            "states": {
                "A": {"transitions": [{
                    "onIntent": "GO",
                    "branch": [
                        {"when": "{{ctx.n}} > 8", "to": "B"},
                        {"when": "else", "to": "C"}
                    ]
                }]},
                "B": {},
                "C": {}
            }
        });
        let validated = validate_flow(&doc).unwrap();
        assert!(validated.warnings.is_empty());
    }
}
