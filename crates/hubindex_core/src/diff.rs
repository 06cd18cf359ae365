//! Recursive structural mapping diff.
//!
//! `diff(a, b)` keeps every entry of `a` that `b` lacks or holds differently.
//! Objects are compared key by key. Arrays are compared as maps keyed by
//! position. Scalars must be strictly equal, so `1` and `1.0` differ. Two
//! mappings are unchanged when the diff is empty in both directions.

use hubindex_engine::Mapping;
use serde_json::Value;

/// Entries of `a` that are missing from `b` or differ from it.
///
/// Nested objects and arrays are reported as their own (nested) diff.
pub fn diff_assoc_recursive(a: &Mapping, b: &Mapping) -> Mapping {
    let mut out = Mapping::new();
    for (key, left) in a {
        let Some(right) = b.get(key) else {
            out.insert(key.clone(), left.clone());
            continue;
        };
        if let Some(reported) = diff_value(left, right) {
            out.insert(key.clone(), reported);
        }
    }
    out
}

fn diff_value(left: &Value, right: &Value) -> Option<Value> {
    match (as_container(left), as_container(right)) {
        (Some(l), Some(r)) => {
            let nested = diff_assoc_recursive(&l, &r);
            (!nested.is_empty()).then_some(Value::Object(nested))
        }
        (Some(_), None) => Some(left.clone()),
        _ if left != right => Some(left.clone()),
        _ => None,
    }
}

fn as_container(value: &Value) -> Option<Mapping> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
        ),
        _ => None,
    }
}

/// Returns true if `current` and `desired` differ in either direction.
pub fn mapping_changed(current: &Mapping, desired: &Mapping) -> bool {
    !diff_assoc_recursive(current, desired).is_empty()
        || !diff_assoc_recursive(desired, current).is_empty()
}

/// Both directions of a mapping diff.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingDiff {
    /// Entries the desired mapping adds or changes.
    pub added: Mapping,
    /// Entries of the current mapping the desired one drops or changes.
    pub removed: Mapping,
}

impl MappingDiff {
    /// Diffs the mapping an index has against the one it should have.
    pub fn between(current: &Mapping, desired: &Mapping) -> Self {
        Self {
            added: diff_assoc_recursive(desired, current),
            removed: diff_assoc_recursive(current, desired),
        }
    }

    /// Returns true if the mappings are structurally equal.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn map(value: Value) -> Mapping {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn equal_mappings_have_no_diff() {
        let a = map(json!({"properties": {"key": {"type": "keyword"}, "tags": ["a", "b"]}}));
        assert!(diff_assoc_recursive(&a, &a).is_empty());
        assert!(!mapping_changed(&a, &a.clone()));
    }

    #[test]
    fn added_field_is_one_sided() {
        let current = map(json!({"properties": {"key": {"type": "keyword"}}}));
        let desired = map(json!({"properties": {"key": {"type": "keyword"}, "color": {"type": "text"}}}));

        assert!(diff_assoc_recursive(&current, &desired).is_empty());
        assert_eq!(
            diff_assoc_recursive(&desired, &current),
            map(json!({"properties": {"color": {"type": "text"}}}))
        );
        assert!(mapping_changed(&current, &desired));
    }

    #[test]
    fn changed_scalar_reported_both_ways() {
        let current = map(json!({"properties": {"key": {"type": "keyword"}}}));
        let desired = map(json!({"properties": {"key": {"type": "text"}}}));
        let diff = MappingDiff::between(&current, &desired);
        assert_eq!(diff.added, map(json!({"properties": {"key": {"type": "text"}}})));
        assert_eq!(diff.removed, map(json!({"properties": {"key": {"type": "keyword"}}})));
    }

    #[test]
    fn arrays_compare_by_position() {
        let a = map(json!({"analyzers": ["lowercase", "asciifolding"]}));
        let b = map(json!({"analyzers": ["asciifolding", "lowercase"]}));
        let shorter = map(json!({"analyzers": ["lowercase"]}));

        assert!(mapping_changed(&a, &b));
        assert_eq!(
            diff_assoc_recursive(&a, &shorter),
            map(json!({"analyzers": {"1": "asciifolding"}}))
        );
        assert!(diff_assoc_recursive(&shorter, &a).is_empty());
    }

    #[test]
    fn container_against_scalar() {
        let nested = map(json!({"dynamic": {"enabled": true}}));
        let flat = map(json!({"dynamic": true}));
        assert_eq!(diff_assoc_recursive(&nested, &flat), nested);
        assert_eq!(diff_assoc_recursive(&flat, &nested), flat);
    }

    #[test]
    fn strict_number_equality() {
        let int = map(json!({"boost": 1}));
        let float = map(json!({"boost": 1.0}));
        assert!(mapping_changed(&int, &float));
    }

    fn fields_mapping(fields: &BTreeMap<String, &str>) -> Mapping {
        let properties: Mapping = fields
            .iter()
            .map(|(name, ty)| (name.clone(), json!({ "type": ty })))
            .collect();
        map(json!({ "properties": properties }))
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn field_types() -> impl Strategy<Value = BTreeMap<String, &'static str>> {
            prop::collection::btree_map(
                "[a-z]{1,6}",
                prop_oneof![Just("keyword"), Just("text"), Just("long")],
                1..8,
            )
        }

        proptest! {
            #[test]
            fn dropped_field_shows_up_on_one_side_only(
                fields in field_types(),
                pick in any::<prop::sample::Index>(),
            ) {
                let full = fields_mapping(&fields);
                let name = pick.get(&fields.keys().cloned().collect::<Vec<_>>()).clone();
                let mut fewer = fields.clone();
                fewer.remove(&name);
                let fewer = fields_mapping(&fewer);

                let diff = MappingDiff::between(&fewer, &full);
                prop_assert!(!diff.is_empty());
                prop_assert!(diff.removed.is_empty());
                prop_assert_eq!(
                    diff.added,
                    map(json!({ "properties": { name.as_str(): { "type": fields[&name] } } }))
                );
            }

            #[test]
            fn identical_field_sets_never_change(fields in field_types()) {
                prop_assert!(!mapping_changed(&fields_mapping(&fields), &fields_mapping(&fields)));
            }
        }
    }
}
