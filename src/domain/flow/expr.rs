//! Guard expression evaluation.
//!
//! The grammar is deliberately small: a single binary operator from a fixed
//! set, applied at the first operator found scanning left-to-right. Each
//! side is template-resolved before comparison. The literal `else` is
//! always true, and an operator-free expression evaluates by truthiness.

use serde_json::Value;

use super::template::{render_value, resolve_template_string, TemplateEnv};

/// Recognized operators, two-character forms listed before their
/// one-character prefixes so `>=` is never read as `>` followed by `=`.
const OPERATORS: [&str; 8] = [">=", "<=", "==", "!=", "&&", "||", ">", "<"];

/// Evaluates a guard expression against the context and an optional tool
/// result environment.
pub fn evaluate(expr: &str, ctx: &Value, tool: Option<&Value>) -> bool {
    let expr = expr.trim();
    if expr == "else" {
        return true;
    }

    let env = TemplateEnv::with_ctx_and_tool(ctx, tool);

    match find_operator(expr) {
        Some((index, op)) => {
            let lhs = resolve_template_string(expr[..index].trim(), &env);
            let rhs = resolve_template_string(expr[index + op.len()..].trim(), &env);
            apply(op, &lhs, &rhs)
        }
        None => truthy(&resolve_template_string(expr, &env)),
    }
}

/// Finds the earliest operator occurrence; ties on position go to the
/// longest operator.
fn find_operator(expr: &str) -> Option<(usize, &'static str)> {
    let mut found: Option<(usize, &'static str)> = None;
    for op in OPERATORS {
        if let Some(index) = expr.find(op) {
            match found {
                Some((best, _)) if best <= index => {}
                _ => found = Some((index, op)),
            }
        }
    }
    found
}

fn apply(op: &str, lhs: &Value, rhs: &Value) -> bool {
    match op {
        "&&" => truthy(lhs) && truthy(rhs),
        "||" => truthy(lhs) || truthy(rhs),
        "==" => values_equal(lhs, rhs),
        "!=" => !values_equal(lhs, rhs),
        _ => {
            let ordering = match (lhs.as_f64(), rhs.as_f64()) {
                (Some(l), Some(r)) => l.partial_cmp(&r),
                _ => Some(render_value(lhs).cmp(&render_value(rhs))),
            };
            let Some(ordering) = ordering else {
                return false;
            };
            match op {
                ">" => ordering.is_gt(),
                ">=" => ordering.is_ge(),
                "<" => ordering.is_lt(),
                "<=" => ordering.is_le(),
                _ => false,
            }
        }
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => render_value(lhs) == render_value(rhs),
    }
}

/// Truthiness: non-empty string, non-zero number, non-empty compound.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn else_literal_is_always_true() {
        assert!(evaluate("else", &json!({}), None));
        assert!(evaluate("  else  ", &json!({}), None));
    }

    #[test]
    fn numeric_greater_than_follows_context_value() {
        let ctx = json!({"x": 10});
        assert!(evaluate("{{ctx.x}} > 8", &ctx, None));

        let ctx = json!({"x": 4});
        assert!(!evaluate("{{ctx.x}} > 8", &ctx, None));
    }

    #[test]
    fn numeric_comparison_applies_when_both_sides_numeric() {
        let ctx = json!({"partySize": "12"});
        assert!(evaluate("{{ctx.partySize}} > 8", &ctx, None));
        assert!(evaluate("{{ctx.partySize}} >= 12", &ctx, None));
        assert!(evaluate("{{ctx.partySize}} <= 12", &ctx, None));
        assert!(!evaluate("{{ctx.partySize}} < 12", &ctx, None));
    }

    #[test]
    fn string_comparison_applies_otherwise() {
        let ctx = json!({"name": "John"});
        assert!(evaluate("{{ctx.name}} == John", &ctx, None));
        assert!(evaluate("{{ctx.name}} != Jane", &ctx, None));
    }

    #[test]
    fn tool_environment_binds_fresh_result() {
        let ctx = json!({});
        let tool = json!({"ok": true});
        assert!(evaluate("{{tool.ok}} == true", &ctx, Some(&tool)));

        let tool = json!({"ok": false});
        assert!(!evaluate("{{tool.ok}} == true", &ctx, Some(&tool)));
    }

    #[test]
    fn two_character_operator_wins_over_prefix() {
        let ctx = json!({"x": 8});
        // ">=" must not be read as ">" with rhs "= 8".
        assert!(evaluate("{{ctx.x}} >= 8", &ctx, None));
    }

    #[test]
    fn conjunction_and_disjunction_use_truthiness() {
        let ctx = json!({"a": "yes", "b": 0});
        assert!(!evaluate("{{ctx.a}} && {{ctx.b}}", &ctx, None));
        assert!(evaluate("{{ctx.a}} || {{ctx.b}}", &ctx, None));
    }

    #[test]
    fn operator_free_expression_is_truthiness() {
        let ctx = json!({"flag": true, "empty": ""});
        assert!(evaluate("{{ctx.flag}}", &ctx, None));
        assert!(!evaluate("{{ctx.empty}}", &ctx, None));
        assert!(!evaluate("{{ctx.missing}}", &ctx, None));
    }

    #[test]
    fn missing_reference_compares_as_empty_string() {
        let ctx = json!({});
        assert!(evaluate("{{ctx.absent}} == ", &ctx, None));
    }
}
