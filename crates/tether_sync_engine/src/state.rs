//! Coordinator state, statistics, and per-operation reports.

use std::time::{Duration, Instant};
use tether_core::{FingerprintConflict, IndexAnomaly};
use tether_sync_protocol::UnreadableField;

/// The current state of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Not syncing.
    Idle,
    /// Checking the transport.
    Connecting,
    /// Pulling and applying server changes.
    Pulling,
    /// Pushing local changes.
    Pushing,
    /// The last sync cycle completed.
    Synced,
    /// The last operation failed.
    Error,
    /// Waiting before retrying.
    RetryWait,
}

/// Running totals for a coordinator.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Sync cycles completed.
    pub cycles_completed: u64,
    /// Incoming items applied.
    pub items_pulled: u64,
    /// Outgoing items acknowledged by the server.
    pub items_pushed: u64,
    /// Fingerprint conflicts met by incoming items.
    pub conflicts_encountered: u64,
    /// Index anomalies reported.
    pub anomalies_reported: u64,
    /// Sealed fields that could not be opened.
    pub unreadable_fields: u64,
    /// Flushes aborted and re-merged.
    pub flushes_aborted: u64,
    /// Retries.
    pub retries: u64,
    /// Last successful sync time.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// A batch handed to the transport and not yet settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushTicket {
    /// Ticket id, passed back to complete or abort the flush.
    pub id: u64,
    /// The encoded batch body.
    pub body: String,
    /// Number of items in the batch.
    pub items: usize,
}

/// What happened to an incoming batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Items applied to the component.
    pub applied: usize,
    /// Items dropped because the component kept its local item.
    pub kept_local: usize,
    /// Records skipped as unreadable or foreign.
    pub skipped: usize,
    /// Collisions found before applying.
    pub conflicts: Vec<FingerprintConflict>,
    /// Anomalies found while updating the indices.
    pub anomalies: Vec<IndexAnomaly>,
    /// Sealed properties that were dropped.
    pub unreadable: Vec<UnreadableField>,
}

/// Result of a sync cycle.
#[derive(Debug, Clone)]
pub struct SyncCycleResult {
    /// The pull half.
    pub ingest: IngestReport,
    /// Items pushed.
    pub pushed: usize,
    /// Duration of the sync cycle.
    pub duration: Duration,
}
