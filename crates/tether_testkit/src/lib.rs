//! # Tether Testkit
//!
//! Test utilities for Tether.
//!
//! This crate provides:
//! - Item, rule, and coordinator fixtures
//! - Property-based test generators using proptest
//! - Cross-implementation test vectors for the field cipher and protocol4
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tether_testkit::prelude::*;
//!
//! #[test]
//! fn renames_collide() {
//!     let mut coordinator = bookmark_coordinator();
//!     coordinator.record_change(None, bookmark("a", "http://x")).unwrap();
//!     // ...
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use vectors::*;
