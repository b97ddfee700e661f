//! A single uniqueness rule and its fingerprint index.

use super::{FingerprintConflict, IndexAnomaly};
use crate::item::{LookupKey, SyncItem};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Joins watched property values into a fingerprint.
pub const FINGERPRINT_SEPARATOR: &str = "\u{1f}";

/// The fingerprint an item has under a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    /// The rule does not apply: the item is a removal, is outside the rule's
    /// type scope, or has none of the watched properties.
    Empty,
    /// Some but not all watched properties are present. The item cannot be
    /// checked and must never be treated as matching anything.
    Incomplete,
    /// The joined values of every watched property.
    Value(String),
}

impl Fingerprint {
    /// The indexable string, if there is one.
    pub fn as_value(&self) -> Option<&str> {
        match self {
            Fingerprint::Value(value) => Some(value),
            Fingerprint::Empty | Fingerprint::Incomplete => None,
        }
    }

    /// Returns true for [`Fingerprint::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Fingerprint::Empty)
    }

    /// Returns true for [`Fingerprint::Incomplete`].
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Fingerprint::Incomplete)
    }
}

/// A named uniqueness constraint over an ordered list of properties, with
/// an index from fingerprint to owning item.
///
/// # Invariants
///
/// - A fingerprint maps to at most one lookup key
/// - An occupied fingerprint is never handed to a different key; the
///   attempt is refused and reported
/// - A removal only evicts a fingerprint owned by the removing key
#[derive(Debug, Clone)]
pub struct ConflictRule {
    name: String,
    type_scope: Option<String>,
    watched: Vec<String>,
    index: HashMap<String, LookupKey>,
}

impl ConflictRule {
    /// Creates a rule over the given properties, applying to every type.
    pub fn new<I, S>(name: impl Into<String>, watched: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            type_scope: None,
            watched: watched.into_iter().map(Into::into).collect(),
            index: HashMap::new(),
        }
    }

    /// Restricts the rule to items of one type.
    #[must_use]
    pub fn scoped_to(mut self, type_id: impl Into<String>) -> Self {
        self.type_scope = Some(type_id.into());
        self
    }

    /// The rule's name, reported with every anomaly.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type the rule is restricted to, if any.
    pub fn type_scope(&self) -> Option<&str> {
        self.type_scope.as_deref()
    }

    /// The watched properties, in fingerprint order.
    pub fn watched_properties(&self) -> &[String] {
        &self.watched
    }

    /// Computes an item's fingerprint under this rule.
    pub fn fingerprint(&self, item: &SyncItem) -> Fingerprint {
        if item.is_remove() {
            return Fingerprint::Empty;
        }
        if let Some(scope) = &self.type_scope {
            if item.type_id() != Some(scope.as_str()) {
                return Fingerprint::Empty;
            }
        }

        let mut missing = false;
        let mut values = Vec::with_capacity(self.watched.len());
        for name in &self.watched {
            match item.property(name) {
                Some(value) => values.push(value),
                None => missing = true,
            }
        }

        if missing && !values.is_empty() {
            warn!(
                rule = %self.name,
                key = %item.lookup_key(),
                "item has only some of the watched properties"
            );
            return Fingerprint::Incomplete;
        }

        let joined = values.join(FINGERPRINT_SEPARATOR);
        if joined.is_empty() {
            Fingerprint::Empty
        } else {
            Fingerprint::Value(joined)
        }
    }

    /// Records `key` as the owner of `fingerprint`.
    ///
    /// Empty and incomplete fingerprints are ignored. If another key already
    /// owns the fingerprint the index is left untouched and the collision is
    /// returned.
    pub fn add_fingerprint(
        &mut self,
        fingerprint: &Fingerprint,
        key: &LookupKey,
    ) -> Result<(), FingerprintConflict> {
        let Some(value) = fingerprint.as_value() else {
            return Ok(());
        };

        match self.index.get(value) {
            Some(owner) if owner == key => Ok(()),
            Some(owner) => {
                let conflict = FingerprintConflict {
                    rule: self.name.clone(),
                    fingerprint: value.to_string(),
                    owner: owner.clone(),
                    challenger: key.clone(),
                };
                warn!(rule = %self.name, owner = %owner, challenger = %key, "fingerprint already owned");
                Err(conflict)
            }
            None => {
                self.index.insert(value.to_string(), key.clone());
                Ok(())
            }
        }
    }

    /// Drops `fingerprint` from the index if `key` owns it.
    ///
    /// Returns true if an entry was removed. A removal for a fingerprint
    /// owned by someone else is a stale update and leaves the index as is.
    pub fn remove_fingerprint(&mut self, fingerprint: &Fingerprint, key: &LookupKey) -> bool {
        let Some(value) = fingerprint.as_value() else {
            return false;
        };

        match self.index.get(value) {
            Some(owner) if owner == key => {
                self.index.remove(value);
                true
            }
            Some(owner) => {
                warn!(rule = %self.name, owner = %owner, stale = %key, "ignoring removal of fingerprint owned by another item");
                false
            }
            None => {
                debug!(rule = %self.name, %key, "removal of unindexed fingerprint");
                false
            }
        }
    }

    /// Moves an item's fingerprint from its old state to its new state.
    ///
    /// Both items must share a lookup key. A removal evicts the old
    /// fingerprint; otherwise the index only changes when the fingerprint
    /// does.
    pub fn update_fingerprints(
        &mut self,
        old: &SyncItem,
        new: &SyncItem,
    ) -> Result<(), IndexAnomaly> {
        if old.lookup_key() != new.lookup_key() {
            warn!(rule = %self.name, old = %old.lookup_key(), new = %new.lookup_key(), "refusing to move fingerprints between identities");
            return Err(IndexAnomaly::IdentityMismatch {
                rule: self.name.clone(),
                old: old.lookup_key().clone(),
                new: new.lookup_key().clone(),
            });
        }

        let old_fp = self.fingerprint(old);
        if new.is_remove() {
            self.remove_fingerprint(&old_fp, old.lookup_key());
            return Ok(());
        }

        let new_fp = self.fingerprint(new);
        if old_fp == new_fp {
            return Ok(());
        }
        self.remove_fingerprint(&old_fp, old.lookup_key());
        self.add_fingerprint(&new_fp, new.lookup_key())
            .map_err(IndexAnomaly::Conflict)
    }

    /// Evicts the confirmed fingerprint of `old` ahead of an incoming update
    /// that has not been applied yet.
    ///
    /// Happens when the update is a removal or carries a usable fingerprint
    /// of its own, so the item does not collide with its own stale entry.
    pub fn reconcile_pending_update(&mut self, old: &SyncItem, incoming: &SyncItem) {
        if incoming.is_remove() || self.fingerprint(incoming).as_value().is_some() {
            let old_fp = self.fingerprint(old);
            self.remove_fingerprint(&old_fp, old.lookup_key());
        }
    }

    /// Indexes an item under its current fingerprint.
    pub fn register(&mut self, item: &SyncItem) -> Result<(), FingerprintConflict> {
        let fp = self.fingerprint(item);
        self.add_fingerprint(&fp, item.lookup_key())
    }

    /// Returns the collision `item` would cause, without touching the index.
    pub fn find_conflict(&self, item: &SyncItem) -> Option<FingerprintConflict> {
        let fp = self.fingerprint(item);
        let value = fp.as_value()?;
        let owner = self.index.get(value)?;
        if owner == item.lookup_key() {
            return None;
        }
        Some(FingerprintConflict {
            rule: self.name.clone(),
            fingerprint: value.to_string(),
            owner: owner.clone(),
            challenger: item.lookup_key().clone(),
        })
    }

    /// Returns true if the fingerprint is indexed.
    pub fn has_fingerprint(&self, fingerprint: &str) -> bool {
        self.index.contains_key(fingerprint)
    }

    /// The key that owns a fingerprint.
    pub fn lookup_key_for(&self, fingerprint: &str) -> Option<&LookupKey> {
        self.index.get(fingerprint)
    }

    /// Drops every fingerprint whose owner is no longer live.
    ///
    /// Returns the number of evicted entries.
    pub fn sweep<F>(&mut self, mut is_live: F) -> usize
    where
        F: FnMut(&LookupKey) -> bool,
    {
        let before = self.index.len();
        self.index.retain(|_, owner| is_live(owner));
        let evicted = before - self.index.len();
        if evicted > 0 {
            debug!(rule = %self.name, evicted, "swept fingerprints of dead items");
        }
        evicted
    }

    /// Number of indexed fingerprints.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Empties the index.
    pub fn clear(&mut self) {
        self.index.clear();
    }
}
