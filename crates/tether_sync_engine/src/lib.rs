//! # Tether Sync Engine
//!
//! Per-component sync coordination for Tether.
//!
//! This crate provides:
//! - [`SyncCoordinator`], which owns one component's pending queue,
//!   conflict indices, and field cipher
//! - [`SyncComponent`], the contract a local data store implements
//! - [`SyncTransport`], the network boundary, with [`MockTransport`]
//! - Retry with exponential backoff
//!
//! ## Architecture
//!
//! A sync cycle is **pull-then-push**:
//! 1. Pull a batch of server changes
//! 2. Check each against the conflict indices, let the component settle
//!    collisions, apply it, and index it
//! 3. Push pending local changes in batches, re-queueing any batch that
//!    fails
//!
//! ## Key Invariants
//!
//! - One coordinator per component; queues and indices are never shared
//! - At most one flush in flight
//! - An aborted flush loses nothing and never overrides newer changes
//! - Local changes stay unconfirmed until a flush carrying them succeeds

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod component;
mod config;
mod coordinator;
mod error;
mod state;
mod transport;

pub use component::{ConflictResolution, MemoryComponent, SyncComponent};
pub use config::{RetryConfig, SyncConfig};
pub use coordinator::SyncCoordinator;
pub use error::{SyncError, SyncResult};
pub use state::{FlushTicket, IngestReport, SyncCycleResult, SyncState, SyncStats};
pub use transport::{MockTransport, SyncTransport};
