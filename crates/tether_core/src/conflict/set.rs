//! The conflict rules of one component.

use super::{ConflictRule, FingerprintConflict, IndexAnomaly};
use crate::item::{LookupKey, SyncItem};

/// All uniqueness rules a component maintains, applied together.
///
/// Each component owns its own set; rule indices are never shared across
/// components.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ConflictRule>,
}

impl RuleSet {
    /// Creates an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`push`](Self::push).
    #[must_use]
    pub fn with_rule(mut self, rule: ConflictRule) -> Self {
        self.push(rule);
        self
    }

    /// Adds a rule.
    pub fn push(&mut self, rule: ConflictRule) {
        self.rules.push(rule);
    }

    /// The rules, in insertion order.
    pub fn rules(&self) -> &[ConflictRule] {
        &self.rules
    }

    /// Finds a rule by name.
    pub fn get(&self, name: &str) -> Option<&ConflictRule> {
        self.rules.iter().find(|rule| rule.name() == name)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Indexes an item under every rule.
    pub fn register(&mut self, item: &SyncItem) -> Vec<IndexAnomaly> {
        self.rules
            .iter_mut()
            .filter_map(|rule| rule.register(item).err())
            .map(IndexAnomaly::Conflict)
            .collect()
    }

    /// Removes an item's current fingerprints from every rule.
    pub fn unregister(&mut self, item: &SyncItem) {
        for rule in &mut self.rules {
            let fp = rule.fingerprint(item);
            rule.remove_fingerprint(&fp, item.lookup_key());
        }
    }

    /// Moves an item's fingerprints from `old` to `new` under every rule.
    pub fn update_fingerprints(&mut self, old: &SyncItem, new: &SyncItem) -> Vec<IndexAnomaly> {
        self.rules
            .iter_mut()
            .filter_map(|rule| rule.update_fingerprints(old, new).err())
            .collect()
    }

    /// Evicts `old`'s fingerprints ahead of an unapplied incoming update.
    pub fn reconcile_pending_update(&mut self, old: &SyncItem, incoming: &SyncItem) {
        for rule in &mut self.rules {
            rule.reconcile_pending_update(old, incoming);
        }
    }

    /// Collisions `item` would cause with other indexed items.
    pub fn find_conflicts(&self, item: &SyncItem) -> Vec<FingerprintConflict> {
        self.rules
            .iter()
            .filter_map(|rule| rule.find_conflict(item))
            .collect()
    }

    /// Rebuilds every index from the authoritative item set.
    ///
    /// Used on cold start; indices are never persisted.
    pub fn rebuild<'a, I>(&mut self, items: I) -> Vec<IndexAnomaly>
    where
        I: IntoIterator<Item = &'a SyncItem>,
    {
        self.clear();
        let mut anomalies = Vec::new();
        for item in items {
            anomalies.extend(self.register(item));
        }
        anomalies
    }

    /// Evicts fingerprints whose owners are no longer live.
    ///
    /// Catches items deleted behind the sync layer's back. Returns the total
    /// number of evicted entries.
    pub fn sweep<F>(&mut self, mut is_live: F) -> usize
    where
        F: FnMut(&LookupKey) -> bool,
    {
        self.rules
            .iter_mut()
            .map(|rule| rule.sweep(&mut is_live))
            .sum()
    }

    /// Empties every index.
    pub fn clear(&mut self) {
        for rule in &mut self.rules {
            rule.clear();
        }
    }
}
