//! Layer overlay for configuration files.
//!
//! Objects merge key by key. Scalars and arrays from a later layer replace
//! what came before. An explicit `null` in a later layer drops the key, so the
//! schema default applies again (for example `store: { path: null }` undoes a
//! path set by the user layer).

use serde_json::Value;

/// Overlay `layer` onto `base` in place.
pub(super) fn overlay_layer(base: &mut Value, layer: &Value) {
    match (base, layer) {
        (Value::Object(base_map), Value::Object(layer_map)) => {
            for (key, value) in layer_map {
                if value.is_null() {
                    base_map.remove(key);
                    continue;
                }
                match base_map.get_mut(key) {
                    Some(existing) => overlay_layer(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::overlay_layer;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn nested_sections_merge_key_by_key() {
        let mut base = json!({ "store": { "backend": "jsonl", "path": "/a" } });
        overlay_layer(&mut base, &json!({ "store": { "path": "/b" }, "history": {} }));
        assert_eq!(
            base,
            json!({ "store": { "backend": "jsonl", "path": "/b" }, "history": {} })
        );
    }

    #[test]
    fn null_drops_the_key() {
        let mut base = json!({ "history": { "recall_limit": 10, "flush_after_assistant": true } });
        overlay_layer(&mut base, &json!({ "history": { "recall_limit": null } }));
        assert_eq!(base, json!({ "history": { "flush_after_assistant": true } }));
    }

    #[test]
    fn scalar_replaces_section() {
        let mut base = json!({ "store": { "backend": "memory" } });
        overlay_layer(&mut base, &json!({ "store": "memory" }));
        assert_eq!(base, json!({ "store": "memory" }));
    }
}
