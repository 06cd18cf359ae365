//! Property-based test generators using proptest.
//!
//! Provides strategies for generating index names and mappings that
//! satisfy the naming rules.

use hubindex_core::{LogicalIndexName, Mapping, Parity, PhysicalIndexName};
use proptest::prelude::*;
use serde_json::Value;

/// Strategy for one valid name segment (prefix, endpoint or tag).
pub fn segment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9]{0,7}(_[a-z0-9]{1,4})?").expect("Invalid regex")
}

/// Strategy for logical index names.
pub fn logical_name_strategy() -> impl Strategy<Value = LogicalIndexName> {
    (segment_strategy(), segment_strategy(), segment_strategy()).prop_map(
        |(prefix, endpoint, tag)| {
            LogicalIndexName::new(&prefix, &endpoint, &tag).expect("generated name is valid")
        },
    )
}

/// Strategy for physical index names of either parity.
pub fn physical_name_strategy() -> impl Strategy<Value = PhysicalIndexName> {
    (logical_name_strategy(), prop_oneof![Just(Parity::Odd), Just(Parity::Even)])
        .prop_map(|(logical, parity)| logical.physical(parity))
}

fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(Value::from),
        prop::string::string_regex("[a-z]{1,8}")
            .expect("Invalid regex")
            .prop_map(Value::String),
    ]
}

fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,6}").expect("Invalid regex")
}

/// Strategy for mapping-like objects up to three levels deep.
///
/// Only objects and scalars are produced, so structural equality of two
/// generated mappings is plain value equality.
pub fn mapping_strategy() -> impl Strategy<Value = Mapping> {
    let value = leaf_strategy().prop_recursive(3, 24, 4, |inner| {
        prop::collection::btree_map(key_strategy(), inner, 0..4)
            .prop_map(|map| Value::Object(map.into_iter().collect()))
    });
    prop::collection::btree_map(key_strategy(), value, 0..5)
        .prop_map(|map| map.into_iter().collect())
}

/// Strategy for `(total, chunk_size)` pairs for batch planning.
pub fn batch_plan_strategy() -> impl Strategy<Value = (u64, u64)> {
    (0u64..5_000, 1u64..400)
}
