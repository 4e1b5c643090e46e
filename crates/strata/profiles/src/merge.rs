//! Deep merge of configuration trees.
//!
//! Child values override parent values. When both sides hold a map the maps
//! are merged key by key; every other combination replaces the parent value
//! wholesale. Replacements that change the kind of value are recorded as
//! [`MergeTypeConflict`]s but are never errors.

use strata_types::{ConfigPath, ConfigValue, MergeTypeConflict};
use tracing::debug;

/// Merge `child` over `parent`, returning a new tree.
pub fn merge(parent: &ConfigValue, child: &ConfigValue) -> ConfigValue {
    let mut merged = parent.clone();
    let mut conflicts = Vec::new();
    merge_into(
        &mut merged,
        child.clone(),
        "",
        &ConfigPath::root(),
        &mut conflicts,
    );
    merged
}

/// Merge `incoming` (owned by profile `profile`) into `target` in place.
pub fn merge_into(
    target: &mut ConfigValue,
    incoming: ConfigValue,
    profile: &str,
    path: &ConfigPath,
    conflicts: &mut Vec<MergeTypeConflict>,
) {
    match incoming {
        ConfigValue::Map(overlay) if matches!(target, ConfigValue::Map(_)) => {
            let Some(base) = target.as_map_mut() else {
                return;
            };
            for (key, value) in overlay {
                let child_path = path.child(key.clone());
                match base.get_mut(&key) {
                    Some(existing) => merge_into(existing, value, profile, &child_path, conflicts),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        incoming => {
            if is_kind_change(target, &incoming) {
                debug!(
                    path = %path,
                    profile,
                    parent_kind = %target.kind(),
                    child_kind = %incoming.kind(),
                    "Child value replaces inherited value of a different kind"
                );
                conflicts.push(MergeTypeConflict {
                    path: path.clone(),
                    profile: profile.to_string(),
                    parent_kind: target.kind(),
                    child_kind: incoming.kind(),
                });
            }
            *target = incoming;
        }
    }
}

/// Null on either side means "unset" and never counts as a kind change.
fn is_kind_change(parent: &ConfigValue, child: &ConfigValue) -> bool {
    !parent.is_null() && !child.is_null() && parent.kind() != child.kind()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use strata_types::ValueKind;

    fn value(v: serde_json::Value) -> ConfigValue {
        ConfigValue::from(v)
    }

    #[test]
    fn nested_maps_union_and_child_wins() {
        let parent = value(json!({"app": {"name": "x", "port": 80}, "db": {"pool": 5}}));
        let child = value(json!({"app": {"port": 8080}, "cache": {"ttl": 60}}));
        assert_eq!(
            merge(&parent, &child),
            value(json!({
                "app": {"name": "x", "port": 8080},
                "db": {"pool": 5},
                "cache": {"ttl": 60}
            }))
        );
    }

    #[test]
    fn lists_are_replaced_not_concatenated() {
        let parent = value(json!({"origins": ["a", "b"]}));
        let child = value(json!({"origins": ["c"]}));
        assert_eq!(merge(&parent, &child), value(json!({"origins": ["c"]})));
    }

    #[test]
    fn kind_changes_are_recorded() {
        let mut target = value(json!({"db": {"pool": 5}, "name": "x"}));
        let mut conflicts = Vec::new();
        merge_into(
            &mut target,
            value(json!({"db": "postgres://db", "name": "y"})),
            "dev",
            &ConfigPath::root(),
            &mut conflicts,
        );
        assert_eq!(target.get("db"), Some(&ConfigValue::from("postgres://db")));
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].path.to_string(), "db");
        assert_eq!(conflicts[0].parent_kind, ValueKind::Map);
        assert_eq!(conflicts[0].child_kind, ValueKind::String);
        assert_eq!(conflicts[0].profile, "dev");
    }

    #[test]
    fn null_overrides_are_not_conflicts() {
        let mut target = value(json!({"db": {"pool": 5}}));
        let mut conflicts = Vec::new();
        merge_into(
            &mut target,
            value(json!({"db": null})),
            "dev",
            &ConfigPath::root(),
            &mut conflicts,
        );
        assert_eq!(target.get("db"), Some(&ConfigValue::Null));
        assert!(conflicts.is_empty());
    }

    fn arb_value() -> impl Strategy<Value = ConfigValue> {
        let leaf = prop_oneof![
            Just(ConfigValue::Null),
            any::<bool>().prop_map(ConfigValue::Bool),
            any::<i64>().prop_map(ConfigValue::Integer),
            "[a-z]{0,6}".prop_map(ConfigValue::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..3).prop_map(ConfigValue::List),
                prop::collection::btree_map("[a-c]{1,2}", inner, 0..4).prop_map(ConfigValue::Map),
            ]
        })
    }

    fn arb_map() -> impl Strategy<Value = ConfigValue> {
        prop::collection::btree_map("[a-c]{1,2}", arb_value(), 0..5).prop_map(ConfigValue::Map)
    }

    proptest! {
        #[test]
        fn merging_empty_child_is_identity(parent in arb_map()) {
            prop_assert_eq!(merge(&parent, &ConfigValue::empty_map()), parent);
        }

        #[test]
        fn child_leaves_always_win(parent in arb_map(), child in arb_map()) {
            let merged = merge(&parent, &child);
            child.visit_leaves(|path, leaf| {
                assert_eq!(merged.get_path(path), Some(leaf));
            });
        }
    }
}
