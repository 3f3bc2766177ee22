//! Deep-merge patch semantics
//!
//! The one merge used everywhere a patch meets content: pending changes
//! over base content, an incoming edit over accumulated pending changes,
//! ephemeral state over merged content.
//!
//! Contract:
//! - objects merge recursively, key by key
//! - arrays in the patch **replace** the base array wholesale (no
//!   concatenation, no element-wise merge)
//! - scalars and `null` replace; a `null` patch value is stored as an
//!   explicit `null` field, not a deletion
//! - a non-object patch replaces the base entirely

use serde_json::Value;

/// Deep-merge `patch` over `base`, returning the merged value.
///
/// Neither input is mutated. Key presence in the patch is what carries
/// meaning; an empty object patch returns `base` unchanged.
#[must_use]
pub fn merge_patch(base: &Value, patch: &Value) -> Value {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            let mut merged = base_map.clone();
            for (key, patch_value) in patch_map {
                let next = match (base_map.get(key), patch_value) {
                    (Some(base_value @ Value::Object(_)), Value::Object(_)) => {
                        merge_patch(base_value, patch_value)
                    }
                    _ => patch_value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        _ => patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn disjoint_keys_accumulate() {
        let base = json!({"name": "Q3 Revenue", "query": "select 1"});
        let patch = json!({"description": "quarterly"});
        let merged = merge_patch(&base, &patch);
        assert_eq!(
            merged,
            json!({"name": "Q3 Revenue", "query": "select 1", "description": "quarterly"})
        );
    }

    #[test]
    fn overlapping_key_latest_wins() {
        let base = json!({"name": "old"});
        let merged = merge_patch(&base, &json!({"name": "new"}));
        assert_eq!(merged, json!({"name": "new"}));
    }

    #[test]
    fn nested_objects_merge_recursively() {
        let base = json!({"vizSettings": {"type": "bar", "stacked": true}});
        let patch = json!({"vizSettings": {"type": "line"}});
        let merged = merge_patch(&base, &patch);
        assert_eq!(
            merged,
            json!({"vizSettings": {"type": "line", "stacked": true}})
        );
    }

    #[test]
    fn arrays_replace_not_concatenate() {
        let base = json!({"assets": [{"type": "question", "id": 1}, {"type": "question", "id": 2}]});
        let patch = json!({"assets": [{"type": "question", "id": 3}]});
        let merged = merge_patch(&base, &patch);
        assert_eq!(merged, json!({"assets": [{"type": "question", "id": 3}]}));
    }

    #[test]
    fn null_is_stored_not_deleted() {
        let merged = merge_patch(&json!({"description": "x"}), &json!({"description": null}));
        assert_eq!(merged, json!({"description": null}));
    }

    #[test]
    fn scalar_base_replaced_by_object_patch() {
        let merged = merge_patch(&json!({"layout": 7}), &json!({"layout": {"columns": 12}}));
        assert_eq!(merged, json!({"layout": {"columns": 12}}));
    }

    #[test]
    fn non_object_patch_replaces_base() {
        assert_eq!(merge_patch(&json!({"a": 1}), &json!([1, 2])), json!([1, 2]));
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (-1000i64..1000).prop_map(|n| json!(n)),
            "[a-z]{0,8}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    fn arb_object() -> impl Strategy<Value = Value> {
        prop::collection::btree_map("[a-z]{1,4}", arb_json(), 0..4)
            .prop_map(|m| Value::Object(m.into_iter().collect()))
    }

    proptest! {
        #[test]
        fn empty_patch_is_identity(base in arb_object()) {
            prop_assert_eq!(merge_patch(&base, &json!({})), base);
        }

        #[test]
        fn merge_is_idempotent(base in arb_json(), patch in arb_json()) {
            let once = merge_patch(&base, &patch);
            let twice = merge_patch(&once, &patch);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn patch_keys_always_present(base in arb_json(), patch in arb_json()) {
            let merged = merge_patch(&base, &patch);
            if let (Value::Object(patch_map), Value::Object(merged_map)) = (&patch, &merged) {
                for key in patch_map.keys() {
                    prop_assert!(merged_map.contains_key(key));
                }
            }
        }
    }
}
