//! Property-based test generators using proptest.
//!
//! Strategies produce values that satisfy the constructors' invariants, so
//! property tests exercise behavior rather than input validation.

use proptest::prelude::*;
use tether_codec::WireMap;
use tether_core::{LookupKey, SyncItem};

/// Strategy for one lookup key segment, separator and escape characters
/// included.
pub fn segment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9%/._-]{1,12}").expect("Invalid regex")
}

/// Strategy for lookup keys.
pub fn lookup_key_strategy() -> impl Strategy<Value = LookupKey> {
    (
        segment_strategy(),
        prop::option::of(segment_strategy()),
        segment_strategy(),
    )
        .prop_map(|(component, type_id, item)| {
            LookupKey::new(&component, type_id.as_deref(), &item).expect("Invalid lookup key")
        })
}

/// Strategy for property names.
pub fn property_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z0-9_]{0,11}").expect("Invalid regex")
}

/// Strategy for property values: printable text of any script, possibly
/// empty.
pub fn property_value_strategy() -> impl Strategy<Value = String> {
    "\\PC{0,24}"
}

/// Strategy for property names containing the wire format's delimiters.
pub fn delimited_name_strategy() -> impl Strategy<Value = String> {
    "(\\PC|[:%\r\n]){1,12}"
}

/// Strategy for property values that may span lines.
pub fn multiline_value_strategy() -> impl Strategy<Value = String> {
    "(\\PC|\r|\n){0,24}"
}

/// Strategy for properties whose names and values contain delimiters.
pub fn delimited_properties_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(
        (delimited_name_strategy(), multiline_value_strategy()),
        0..6,
    )
}

/// Strategy for an item's properties, in generated order.
pub fn properties_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec((property_name_strategy(), property_value_strategy()), 0..6)
}

/// One local mutation of an item.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Set these properties.
    Update(Vec<(String, String)>),
    /// Remove the item.
    Remove,
}

impl Mutation {
    /// Applies the mutation to `key`, producing the item to enqueue.
    pub fn to_item(&self, key: &LookupKey) -> SyncItem {
        match self {
            Mutation::Update(properties) => properties
                .iter()
                .fold(SyncItem::from_key(key.clone()), |item, (name, value)| {
                    item.with_property(name.as_str(), value.as_str())
                }),
            Mutation::Remove => SyncItem::removal(key.clone()),
        }
    }
}

/// Strategy for mutations, mostly updates.
pub fn mutation_strategy() -> impl Strategy<Value = Mutation> {
    prop_oneof![
        4 => properties_strategy().prop_map(Mutation::Update),
        1 => Just(Mutation::Remove),
    ]
}

/// Strategy for a sequence of mutations of one item.
pub fn mutation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<Mutation>> {
    prop::collection::vec(mutation_strategy(), min_ops..max_ops)
}

/// Strategy for field names accepted by the protocol4 serializer.
pub fn wire_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_.]{1,16}").expect("Invalid regex")
}

/// Strategy for field maps whose values fit on one line.
pub fn wire_map_strategy() -> impl Strategy<Value = WireMap> {
    prop::collection::vec((wire_name_strategy(), property_value_strategy()), 0..8)
        .prop_map(|pairs| pairs.into_iter().collect())
}

/// Strategy for field maps whose values may span lines.
pub fn multiline_wire_map_strategy() -> impl Strategy<Value = WireMap> {
    prop::collection::vec((wire_name_strategy(), multiline_value_strategy()), 0..8)
        .prop_map(|pairs| pairs.into_iter().collect())
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
