//! Pending outbound mutations, collapsed per item.

use crate::item::{LookupKey, SyncItem};
use indexmap::IndexMap;
use tracing::debug;

/// Buffers local mutations until they are flushed to the server.
///
/// The queue holds at most one entry per [`LookupKey`]. Each entry is the
/// net effect of every mutation enqueued for that key since the last flush,
/// folded together in enqueue order.
///
/// # Invariants
///
/// - One entry per lookup key
/// - An entry is the in-order merge of every mutation enqueued for its key
/// - Entries drain oldest key first
#[derive(Debug, Clone, Default)]
pub struct UpdateQueue {
    pending: IndexMap<LookupKey, SyncItem>,
}

impl UpdateQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a mutation, overlaying it onto any pending entry for the
    /// same item.
    ///
    /// Returns true if the pending state changed.
    pub fn add_item(&mut self, item: SyncItem) -> bool {
        match self.pending.get_mut(item.lookup_key()) {
            Some(existing) => existing.merge_from(&item),
            None => {
                self.pending.insert(item.lookup_key().clone(), item);
                true
            }
        }
    }

    /// Enqueues a mutation that fully replaces any pending entry for the
    /// same item, rather than overlaying it.
    ///
    /// Returns true if the pending state changed.
    pub fn replace_item(&mut self, item: SyncItem) -> bool {
        match self.pending.get_mut(item.lookup_key()) {
            Some(existing) => existing.replace_from(&item),
            None => {
                self.pending.insert(item.lookup_key().clone(), item);
                true
            }
        }
    }

    /// Returns the pending entry for a key.
    pub fn get_item_by_lookup_key(&self, key: &LookupKey) -> Option<&SyncItem> {
        self.pending.get(key)
    }

    /// Drops the pending entry for a key.
    pub fn delete_item_by_lookup_key(&mut self, key: &LookupKey) -> Option<SyncItem> {
        let removed = self.pending.shift_remove(key);
        if removed.is_none() {
            debug!(%key, "delete of key with no pending update");
        }
        removed
    }

    /// Returns true if anything is pending.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of pending entries.
    pub fn pending_size(&self) -> usize {
        self.pending.len()
    }

    /// Snapshot of all pending entries.
    pub fn get_pending(&self) -> Vec<SyncItem> {
        self.pending.values().cloned().collect()
    }

    /// Iterates pending entries without cloning them.
    pub fn iter(&self) -> impl Iterator<Item = &SyncItem> {
        self.pending.values()
    }

    /// Returns true if a key is pending.
    pub fn contains(&self, key: &LookupKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Removes and returns one pending entry.
    pub fn pop_next_item(&mut self) -> Option<SyncItem> {
        self.pending.shift_remove_index(0).map(|(_, item)| item)
    }

    /// Moves up to `limit` of the oldest entries into a new queue.
    pub fn take_batch(&mut self, limit: usize) -> UpdateQueue {
        let count = limit.min(self.pending.len());
        UpdateQueue {
            pending: self.pending.drain(..count).collect(),
        }
    }

    /// Merges every entry of `other` into this queue, as if each had been
    /// passed to [`add_item`](Self::add_item) after everything already here.
    pub fn append(&mut self, other: UpdateQueue) {
        for item in other.pending.into_values() {
            self.add_item(item);
        }
    }

    /// Drops every pending entry.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Keys of the pending entries.
    pub fn keys(&self) -> impl Iterator<Item = &LookupKey> {
        self.pending.keys()
    }
}

impl IntoIterator for UpdateQueue {
    type Item = SyncItem;
    type IntoIter = indexmap::map::IntoValues<LookupKey, SyncItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.pending.into_values()
    }
}
