//! Sparse diff between two content values
//!
//! Inverse-direction companion to [`merge_patch`](crate::merge_patch): given
//! a base and a target, produce the smallest patch whose merge over the base
//! yields the target. Used by the serialized find/replace edit path, which
//! edits a whole merged document and needs the result re-expressed as
//! pending changes.

use serde_json::Value;

/// Compute a sparse patch such that `merge_patch(base, &patch) == target`.
///
/// Objects are diffed key by key and recursed; arrays and scalars that
/// differ appear whole. A key present in `base` but absent from `target`
/// surfaces as an explicit `null` (the merge contract stores `null`, it
/// does not delete, so true key removal is not representable).
#[must_use]
pub fn diff_patch(base: &Value, target: &Value) -> Value {
    match (base, target) {
        (Value::Object(base_map), Value::Object(target_map)) => {
            let mut patch = serde_json::Map::new();
            for (key, target_value) in target_map {
                match base_map.get(key) {
                    Some(base_value) if base_value == target_value => {}
                    Some(base_value @ Value::Object(_)) if target_value.is_object() => {
                        patch.insert(key.clone(), diff_patch(base_value, target_value));
                    }
                    _ => {
                        patch.insert(key.clone(), target_value.clone());
                    }
                }
            }
            for key in base_map.keys() {
                if !target_map.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }
            Value::Object(patch)
        }
        _ => target.clone(),
    }
}
