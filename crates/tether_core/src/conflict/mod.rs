//! Conflict detection.
//!
//! A [`ConflictRule`] is a uniqueness constraint over a subset of an item's
//! properties, e.g. "no two bookmarks share a URL". Each rule keeps an index
//! from fingerprint (the joined values of the watched properties) to the
//! [`LookupKey`] that currently owns it, so a component can learn in O(1)
//! whether an item collides with a *different* item it already knows.
//!
//! The index only detects collisions. It never picks a winner: a second
//! owner for an occupied fingerprint is refused and reported back as an
//! [`IndexAnomaly`] for the owning component to resolve.

mod rule;
mod set;

pub use rule::{ConflictRule, Fingerprint, FINGERPRINT_SEPARATOR};
pub use set::RuleSet;

use crate::item::LookupKey;
use std::fmt;

/// Two distinct items claim the same fingerprint under one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintConflict {
    /// Name of the rule that detected the collision.
    pub rule: String,
    /// The contested fingerprint.
    pub fingerprint: String,
    /// The item that currently owns the fingerprint.
    pub owner: LookupKey,
    /// The item that tried to claim it.
    pub challenger: LookupKey,
}

impl fmt::Display for FingerprintConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule {:?}: {} already owns a fingerprint claimed by {}",
            self.rule, self.owner, self.challenger
        )
    }
}

/// A data-consistency problem found while maintaining a conflict index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexAnomaly {
    /// A fingerprint is already owned by another item.
    Conflict(FingerprintConflict),
    /// Fingerprints were asked to move between two different identities.
    IdentityMismatch {
        /// Name of the rule.
        rule: String,
        /// Key of the old item.
        old: LookupKey,
        /// Key of the new item.
        new: LookupKey,
    },
}

impl IndexAnomaly {
    /// Returns the fingerprint conflict, if this anomaly is one.
    pub fn as_conflict(&self) -> Option<&FingerprintConflict> {
        match self {
            IndexAnomaly::Conflict(conflict) => Some(conflict),
            IndexAnomaly::IdentityMismatch { .. } => None,
        }
    }

    /// Name of the rule that reported the anomaly.
    pub fn rule(&self) -> &str {
        match self {
            IndexAnomaly::Conflict(conflict) => &conflict.rule,
            IndexAnomaly::IdentityMismatch { rule, .. } => rule,
        }
    }
}

impl fmt::Display for IndexAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexAnomaly::Conflict(conflict) => conflict.fmt(f),
            IndexAnomaly::IdentityMismatch { rule, old, new } => {
                write!(f, "rule {rule:?}: cannot move fingerprints from {old} to {new}")
            }
        }
    }
}
