//! The data source a coordinator syncs on behalf of.

use crate::error::SyncResult;
use indexmap::IndexMap;
use tether_core::{FingerprintConflict, LookupKey, SyncItem};
use tether_sync_protocol::{FieldPolicy, SensitiveFields};

/// How a component settles an incoming item that collides with a local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Drop the incoming item; the local item keeps the fingerprint.
    KeepLocal,
    /// Apply the incoming item. The component deals with the local owner
    /// while applying; the coordinator re-reads it afterwards.
    AcceptRemote,
}

/// A local data store whose items are kept in sync.
///
/// The component owns the authoritative item set. It decides which
/// properties are sensitive ([`FieldPolicy`]) and how collisions are
/// settled; the coordinator only detects them.
pub trait SyncComponent: FieldPolicy {
    /// Returns the local state of an item, if it exists.
    fn current_item(&self, key: &LookupKey) -> Option<SyncItem>;

    /// Stores an item received from the server. Removals delete.
    fn apply_incoming(&mut self, item: &SyncItem) -> SyncResult<()>;

    /// Chooses what to do with `incoming`, which collides with
    /// `conflict.owner`.
    fn resolve_conflict(
        &mut self,
        incoming: &SyncItem,
        conflict: &FingerprintConflict,
    ) -> ConflictResolution;

    /// Every live item, for rebuilding conflict indices on cold start.
    fn live_items(&self) -> Vec<SyncItem>;
}

/// An in-memory component for testing.
#[derive(Debug, Clone)]
pub struct MemoryComponent {
    items: IndexMap<LookupKey, SyncItem>,
    sensitive: SensitiveFields,
    resolution: ConflictResolution,
    conflicts_seen: Vec<FingerprintConflict>,
}

impl MemoryComponent {
    /// Creates an empty component that accepts remote items on conflict.
    pub fn new() -> Self {
        Self {
            items: IndexMap::new(),
            sensitive: SensitiveFields::default(),
            resolution: ConflictResolution::AcceptRemote,
            conflicts_seen: Vec::new(),
        }
    }

    /// Marks property names as sensitive.
    pub fn with_sensitive_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sensitive = SensitiveFields::new(names);
        self
    }

    /// Sets the answer given to every conflict.
    pub fn with_resolution(mut self, resolution: ConflictResolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Writes an item locally, as a user edit would.
    pub fn insert(&mut self, item: SyncItem) -> Option<SyncItem> {
        self.items.insert(item.lookup_key().clone(), item)
    }

    /// Deletes an item locally.
    pub fn remove(&mut self, key: &LookupKey) -> Option<SyncItem> {
        self.items.shift_remove(key)
    }

    /// Returns an item.
    pub fn get(&self, key: &LookupKey) -> Option<&SyncItem> {
        self.items.get(key)
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Conflicts handed to [`resolve_conflict`](SyncComponent::resolve_conflict).
    pub fn conflicts_seen(&self) -> &[FingerprintConflict] {
        &self.conflicts_seen
    }
}

impl Default for MemoryComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldPolicy for MemoryComponent {
    fn is_sensitive(&self, key: &LookupKey, property: &str) -> bool {
        self.sensitive.is_sensitive(key, property)
    }
}

impl SyncComponent for MemoryComponent {
    fn current_item(&self, key: &LookupKey) -> Option<SyncItem> {
        self.items.get(key).cloned()
    }

    fn apply_incoming(&mut self, item: &SyncItem) -> SyncResult<()> {
        if item.is_remove() {
            self.items.shift_remove(item.lookup_key());
        } else {
            self.items.insert(item.lookup_key().clone(), item.clone());
        }
        Ok(())
    }

    fn resolve_conflict(
        &mut self,
        _incoming: &SyncItem,
        conflict: &FingerprintConflict,
    ) -> ConflictResolution {
        self.conflicts_seen.push(conflict.clone());
        self.resolution
    }

    fn live_items(&self) -> Vec<SyncItem> {
        self.items.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bookmark(id: &str) -> SyncItem {
        SyncItem::new("bookmarks", None, id)
            .unwrap()
            .with_property("url", format!("http://{id}"))
    }

    #[test]
    fn apply_incoming_stores_and_removes() {
        let mut component = MemoryComponent::new();
        let item = bookmark("a");
        component.apply_incoming(&item).unwrap();
        assert_eq!(component.current_item(item.lookup_key()), Some(item.clone()));

        let removal = SyncItem::removal(item.lookup_key().clone());
        component.apply_incoming(&removal).unwrap();
        assert!(component.is_empty());
    }

    #[test]
    fn sensitive_fields() {
        let component = MemoryComponent::new().with_sensitive_fields(["password"]);
        let key = bookmark("a").lookup_key().clone();
        assert!(component.is_sensitive(&key, "password"));
        assert!(!component.is_sensitive(&key, "url"));
    }
}
