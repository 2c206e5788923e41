//! Template interpolation over context, slot, and tool environments.
//!
//! Authored strings may embed `{{ctx.path}}`, `{{slot.path}}`, and
//! `{{tool.path}}` references. Resolution substitutes every reference,
//! then re-reads the resulting string leniently: an exact JSON literal is
//! parsed, a pure integer or decimal coerces to a number, anything else
//! stays a string. Nested objects and arrays resolve recursively.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::domain::foundation::get_path;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*(ctx|slot|tool)\.([A-Za-z0-9_][A-Za-z0-9_.\-]*)\s*\}\}")
        .expect("placeholder pattern is valid")
});

static PURE_INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+$").expect("integer pattern is valid"));

static PURE_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+\.\d+$").expect("decimal pattern is valid"));

/// The three lookup environments a template may reference.
///
/// Environments are optional; a reference into an absent environment
/// resolves to the empty string, same as a missing path.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEnv<'a> {
    pub ctx: Option<&'a Value>,
    pub slot: Option<&'a Value>,
    pub tool: Option<&'a Value>,
}

impl<'a> TemplateEnv<'a> {
    /// Environment with only `ctx` bound.
    pub fn with_ctx(ctx: &'a Value) -> Self {
        Self {
            ctx: Some(ctx),
            slot: None,
            tool: None,
        }
    }

    /// Environment with `ctx` and `tool` bound.
    pub fn with_ctx_and_tool(ctx: &'a Value, tool: Option<&'a Value>) -> Self {
        Self {
            ctx: Some(ctx),
            slot: None,
            tool,
        }
    }

    fn lookup(&self, env: &str, path: &str) -> Option<&'a Value> {
        let root = match env {
            "ctx" => self.ctx,
            "slot" => self.slot,
            "tool" => self.tool,
            _ => None,
        }?;
        get_path(root, path)
    }
}

/// Resolves a template value of any shape against the environments.
pub fn resolve(template: &Value, env: &TemplateEnv<'_>) -> Value {
    match template {
        Value::String(s) => resolve_template_string(s, env),
        Value::Array(items) => Value::Array(items.iter().map(|item| resolve(item, env)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), resolve(value, env)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolves one template string: substitution followed by lenient parsing.
pub fn resolve_template_string(template: &str, env: &TemplateEnv<'_>) -> Value {
    let substituted = PLACEHOLDER.replace_all(template, |caps: &regex::Captures<'_>| {
        env.lookup(&caps[1], &caps[2])
            .map(render_value)
            .unwrap_or_default()
    });
    parse_lenient(&substituted)
}

/// Renders a value as replacement text inside a template.
///
/// Strings render raw (no quotes); compound values render as JSON so a
/// whole-object reference survives the string round-trip.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        compound => serde_json::to_string(compound).unwrap_or_default(),
    }
}

fn parse_lenient(text: &str) -> Value {
    if let Ok(parsed) = serde_json::from_str::<Value>(text) {
        return parsed;
    }
    if PURE_INTEGER.is_match(text) {
        if let Ok(n) = text.parse::<i64>() {
            return Value::from(n);
        }
    }
    if PURE_DECIMAL.is_match(text) {
        if let Ok(n) = text.parse::<f64>() {
            return Value::from(n);
        }
    }
    Value::String(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env<'a>(ctx: &'a Value, slot: &'a Value, tool: &'a Value) -> TemplateEnv<'a> {
        TemplateEnv {
            ctx: Some(ctx),
            slot: Some(slot),
            tool: Some(tool),
        }
    }

    #[test]
    fn substitutes_ctx_reference_inside_text() {
        let ctx = json!({"partySize": 4});
        let resolved = resolve_template_string(
            "Table for {{ctx.partySize}}, coming up",
            &TemplateEnv::with_ctx(&ctx),
        );
        assert_eq!(resolved, json!("Table for 4, coming up"));
    }

    #[test]
    fn lone_numeric_reference_coerces_to_number() {
        let slot = json!({"partySize": "4"});
        let ctx = json!({});
        let tool = json!({});
        let resolved = resolve_template_string("{{slot.partySize}}", &env(&ctx, &slot, &tool));
        assert_eq!(resolved, json!(4));
    }

    #[test]
    fn missing_lookup_yields_empty_string() {
        let ctx = json!({});
        let resolved =
            resolve_template_string("{{ctx.absent}}", &TemplateEnv::with_ctx(&ctx));
        assert_eq!(resolved, json!(""));
    }

    #[test]
    fn absent_environment_behaves_like_missing_path() {
        let resolved = resolve_template_string("{{slot.partySize}}", &TemplateEnv::default());
        assert_eq!(resolved, json!(""));
    }

    #[test]
    fn json_literal_string_parses_after_substitution() {
        let tool = json!({"ok": true});
        let ctx = json!({});
        let slot = json!({});
        let resolved = resolve_template_string("{{tool.ok}}", &env(&ctx, &slot, &tool));
        assert_eq!(resolved, json!(true));
    }

    #[test]
    fn nested_structures_resolve_recursively() {
        let ctx = json!({"date": "2024-06-01", "time": "19:00", "partySize": 4});
        let template = json!({
            "date": "{{ctx.date}}",
            "time": "{{ctx.time}}",
            "partySize": "{{ctx.partySize}}",
            "labels": ["{{ctx.date}} {{ctx.time}}"]
        });
        let resolved = resolve(&template, &TemplateEnv::with_ctx(&ctx));
        assert_eq!(
            resolved,
            json!({
                "date": "2024-06-01",
                "time": "19:00",
                "partySize": 4,
                "labels": ["2024-06-01 19:00"]
            })
        );
    }

    #[test]
    fn whole_object_reference_survives_round_trip() {
        let ctx = json!({"contact": {"name": "John Doe", "phone": "555-1234"}});
        let resolved = resolve_template_string("{{ctx.contact}}", &TemplateEnv::with_ctx(&ctx));
        assert_eq!(resolved, json!({"name": "John Doe", "phone": "555-1234"}));
    }

    #[test]
    fn resolution_is_idempotent_on_plain_strings() {
        let ctx = json!({});
        let once = resolve_template_string("Hello there", &TemplateEnv::with_ctx(&ctx));
        assert_eq!(once, json!("Hello there"));
        let twice = resolve(&once, &TemplateEnv::with_ctx(&ctx));
        assert_eq!(once, twice);
    }

    #[test]
    fn decimal_string_coerces_to_number() {
        let slot = json!({"amount": "12.5"});
        let ctx = json!({});
        let tool = json!({});
        let resolved = resolve_template_string("{{slot.amount}}", &env(&ctx, &slot, &tool));
        assert_eq!(resolved, json!(12.5));
    }

    #[test]
    fn non_numeric_text_stays_a_string() {
        let ctx = json!({"name": "John"});
        let resolved = resolve_template_string("{{ctx.name}}", &TemplateEnv::with_ctx(&ctx));
        assert_eq!(resolved, json!("John"));
    }
}
