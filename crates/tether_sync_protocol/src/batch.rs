//! Batches of items exchanged with the server.

use crate::error::{ProtocolError, ProtocolResult};
use crate::record::{read_record, RecordWriter, UnreadableField};
use std::collections::BTreeMap;
use tether_codec::{serialize, FramedParser, WireMap};
use tether_core::crypto::FieldCipher;
use tether_core::{SyncItem, UpdateQueue};
use tracing::{debug, warn};

/// Protocol version carried in every batch header.
pub const PROTOCOL_VERSION: &str = "4";
/// Header field naming the protocol version.
pub const FIELD_VERSION: &str = "version";
/// Header field holding the number of items.
pub const FIELD_COUNT: &str = "count";

/// An ordered list of items sent or received in one body.
///
/// Item `i` is written with the field prefix `"<i>."`, after a
/// `version` and `count` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    items: Vec<SyncItem>,
}

impl Batch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a batch holding the pending items of `queue`, in queue order.
    pub fn from_queue(queue: &UpdateQueue) -> Self {
        Self {
            items: queue.get_pending(),
        }
    }

    /// Appends an item.
    pub fn push(&mut self, item: SyncItem) {
        self.items.push(item);
    }

    /// Returns the items.
    pub fn items(&self) -> &[SyncItem] {
        &self.items
    }

    /// Consumes the batch and returns the items.
    pub fn into_items(self) -> Vec<SyncItem> {
        self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the batch has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Encodes the batch into a field map.
    pub fn encode(&self, writer: &RecordWriter<'_>) -> ProtocolResult<WireMap> {
        let mut map = WireMap::new();
        map.insert(FIELD_VERSION.to_string(), PROTOCOL_VERSION.to_string());
        map.insert(FIELD_COUNT.to_string(), self.items.len().to_string());
        for (index, item) in self.items.iter().enumerate() {
            writer.write(item, &format!("{index}."), &mut map)?;
        }
        Ok(map)
    }

    /// Encodes the batch into a protocol4 body.
    pub fn to_body(&self, writer: &RecordWriter<'_>) -> ProtocolResult<String> {
        let map = self.encode(writer)?;
        Ok(serialize(&map)?)
    }

    /// Decodes a batch from a field map.
    ///
    /// Records that cannot be read are skipped and counted; sealed
    /// properties that cannot be opened are dropped and listed. Only
    /// a bad header fails the whole batch.
    ///
    /// # Errors
    ///
    /// Fails if the version is missing or unsupported, or the count is not
    /// a number.
    pub fn decode(map: &WireMap, cipher: Option<&FieldCipher>) -> ProtocolResult<DecodedBatch> {
        let version = map
            .get(FIELD_VERSION)
            .ok_or_else(|| ProtocolError::missing_field(FIELD_VERSION))?;
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion {
                found: version.clone(),
            });
        }
        let count: usize = match map.get(FIELD_COUNT) {
            Some(count) => count
                .parse()
                .map_err(|_| ProtocolError::invalid_field(FIELD_COUNT, "not a number"))?,
            None => 0,
        };

        let mut records: BTreeMap<usize, WireMap> = BTreeMap::new();
        for (name, value) in map {
            let Some((index, field)) = name.split_once('.') else {
                continue;
            };
            let Ok(index) = index.parse::<usize>() else {
                continue;
            };
            if index >= count {
                debug!(field = %name, count, "ignoring field beyond item count");
                continue;
            }
            records
                .entry(index)
                .or_default()
                .insert(field.to_string(), value.clone());
        }

        let mut decoded = DecodedBatch {
            skipped: count - records.len(),
            ..DecodedBatch::default()
        };
        for (index, record) in records {
            match read_record(&record, cipher) {
                Ok(item) => {
                    decoded.items.push(item.item);
                    decoded.unreadable.extend(item.unreadable);
                }
                Err(error) => {
                    warn!(index, %error, "skipping unreadable record");
                    decoded.skipped += 1;
                }
            }
        }
        Ok(decoded)
    }

    /// Decodes a batch from a protocol4 body.
    ///
    /// Values are read by their declared length, so a value holding a
    /// newline stays inside its own field.
    pub fn from_body(body: &str, cipher: Option<&FieldCipher>) -> ProtocolResult<DecodedBatch> {
        Self::decode(&read_fields(body), cipher)
    }
}

impl FromIterator<SyncItem> for Batch {
    fn from_iter<T: IntoIterator<Item = SyncItem>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Reads the fields of a body, honouring each record's length.
///
/// Reading stops at the first record with broken framing; fields before it
/// are kept, and the items they would have completed count as skipped.
pub(crate) fn read_fields(body: &str) -> WireMap {
    let mut parser = FramedParser::new(body);
    let mut map = WireMap::new();
    loop {
        match parser.next_record() {
            Ok(Some((name, value))) => {
                map.insert(name.to_string(), value.to_string());
            }
            Ok(None) => break,
            Err(error) => {
                warn!(%error, "truncating body at malformed record");
                break;
            }
        }
    }
    map
}

/// The outcome of reading a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedBatch {
    /// Items read, in index order.
    pub items: Vec<SyncItem>,
    /// Sealed properties that could not be opened.
    pub unreadable: Vec<UnreadableField>,
    /// Records that were missing or could not be read.
    pub skipped: usize,
}
