//! # Tether Core
//!
//! The reconciliation core of the Tether sync client.
//!
//! This crate provides:
//! - [`SyncItem`] and its identity, [`LookupKey`]
//! - [`UpdateQueue`], which collapses repeated local mutations of an item
//!   into one net pending change
//! - [`ConflictRule`] and [`RuleSet`], fingerprint indices that detect two
//!   different items colliding on identifying properties
//! - [`crypto::FieldCipher`], deterministic context-bound encryption of
//!   single values
//!
//! Everything here is synchronous and in-memory. Queues and rule indices
//! are owned by one component's coordinator and are never shared.
//!
//! ## Key Invariants
//!
//! - Lookup key equality is the only identity test
//! - At most one pending entry per lookup key
//! - A fingerprint has at most one owner; collisions are reported, never
//!   resolved here

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod conflict;
pub mod crypto;
mod error;
mod item;
mod queue;

pub use conflict::{ConflictRule, Fingerprint, FingerprintConflict, IndexAnomaly, RuleSet};
pub use error::{CoreError, CoreResult};
pub use item::{LookupKey, Properties, SyncItem};
pub use queue::UpdateQueue;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
