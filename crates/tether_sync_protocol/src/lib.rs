//! # Tether Sync Protocol
//!
//! Item records and batch framing for Tether sync bodies.
//!
//! This crate provides:
//! - [`RecordWriter`] and [`read_record`], mapping one [`SyncItem`] to
//!   protocol4 fields and back, sealing sensitive properties with a
//!   [`FieldCipher`]
//! - [`Batch`], the `version`/`count` framed list of items pushed to or
//!   pulled from the server
//! - [`PushAck`], the server's reply to a push
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! [`SyncItem`]: tether_core::SyncItem
//! [`FieldCipher`]: tether_core::crypto::FieldCipher

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod ack;
mod batch;
mod error;
mod record;

pub use ack::{AckStatus, PushAck, FIELD_ERROR, FIELD_STATUS};
pub use batch::{Batch, DecodedBatch, FIELD_COUNT, FIELD_VERSION, PROTOCOL_VERSION};
pub use error::{ProtocolError, ProtocolResult};
pub use record::{
    read_record, DecodedItem, FieldPolicy, PlaintextFields, RecordWriter, SensitiveFields,
    UnreadableField, FIELD_COMPONENT, FIELD_ITEM, FIELD_REMOVE, FIELD_TYPE, PLAIN_PREFIX,
    SEALED_PREFIX,
};
