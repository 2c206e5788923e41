//! Helpers for the session context tree.
//!
//! The dialog context is a nested `serde_json::Value` mapping keyed by
//! dotted paths. Templates read from it with `get_path`, assignments write
//! through `set_path`, and context patches land via `deep_merge`.

use serde_json::{Map, Value};

/// Looks up a dotted path (`"contact.name"`) in a value tree.
///
/// Returns `None` when any segment is missing or a non-object is traversed.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Writes `value` at a dotted path, creating intermediate objects as needed.
///
/// A non-object encountered along the way is replaced by an object; the
/// final segment always overwrites.
pub fn set_path(root: &mut Value, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = root;

    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let map = current.as_object_mut().expect("just ensured object");
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Deep-merges `patch` into `target`.
///
/// Objects merge key-by-key recursively; every other value kind replaces
/// the target wholesale. Merging `null` leaves the target untouched so a
/// missing template lookup cannot erase collected context.
pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match target_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, patch_value),
                    None => {
                        target_map.insert(key.clone(), patch_value.clone());
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (target_slot, patch_value) => *target_slot = patch_value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_path_resolves_nested_values() {
        let ctx = json!({"contact": {"name": "John Doe", "phone": "555-1234"}});
        assert_eq!(
            get_path(&ctx, "contact.name"),
            Some(&json!("John Doe"))
        );
    }

    #[test]
    fn get_path_returns_none_for_missing_segment() {
        let ctx = json!({"contact": {"name": "John Doe"}});
        assert_eq!(get_path(&ctx, "contact.email"), None);
        assert_eq!(get_path(&ctx, "address.city"), None);
    }

    #[test]
    fn get_path_returns_none_when_traversing_scalar() {
        let ctx = json!({"partySize": 4});
        assert_eq!(get_path(&ctx, "partySize.value"), None);
    }

    #[test]
    fn set_path_creates_intermediate_objects() {
        let mut ctx = json!({});
        set_path(&mut ctx, "contact.name", json!("John Doe"));
        assert_eq!(ctx, json!({"contact": {"name": "John Doe"}}));
    }

    #[test]
    fn set_path_overwrites_existing_leaf() {
        let mut ctx = json!({"partySize": 2});
        set_path(&mut ctx, "partySize", json!(4));
        assert_eq!(ctx, json!({"partySize": 4}));
    }

    #[test]
    fn deep_merge_combines_nested_objects() {
        let mut target = json!({"contact": {"name": "John Doe"}, "partySize": 4});
        let patch = json!({"contact": {"phone": "555-1234"}});
        deep_merge(&mut target, &patch);
        assert_eq!(
            target,
            json!({
                "contact": {"name": "John Doe", "phone": "555-1234"},
                "partySize": 4
            })
        );
    }

    #[test]
    fn deep_merge_replaces_scalars() {
        let mut target = json!({"date": "2024-01-01"});
        deep_merge(&mut target, &json!({"date": "2024-02-02"}));
        assert_eq!(target, json!({"date": "2024-02-02"}));
    }

    #[test]
    fn deep_merge_ignores_null_patch_values() {
        let mut target = json!({"time": "19:00"});
        deep_merge(&mut target, &json!({"time": null}));
        assert_eq!(target, json!({"time": "19:00"}));
    }
}
