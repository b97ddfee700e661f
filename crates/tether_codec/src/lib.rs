//! # Tether Codec
//!
//! The protocol4 wire format used for every Tether sync body.
//!
//! A body is a sequence of records, one per line:
//!
//! ```text
//! name:length:value\n
//! ```
//!
//! where `length` is the byte length of `value`. A trailing `\r` before the
//! newline is tolerated. Names may not contain `:` or line breaks; values are
//! opaque strings.
//!
//! Two parsers are provided:
//! - [`parse`] reads line by line and silently skips lines it does not
//!   understand. This is what clients use for server responses.
//! - [`parse_framed`] honours the length prefix, so values may contain
//!   newlines, and reports framing errors.
//!
//! ## Usage
//!
//! ```
//! use tether_codec::{parse, serialize, WireMap};
//!
//! let mut map = WireMap::new();
//! map.insert("foo".to_string(), "bar".to_string());
//!
//! let body = serialize(&map).unwrap();
//! assert_eq!(body, "foo:3:bar\n");
//! assert_eq!(parse(&body), map);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod parser;
mod serializer;

pub use error::{CodecError, CodecResult};
pub use parser::{parse, parse_framed, FramedParser};
pub use serializer::{serialize, Serializer};

/// A flat, insertion-ordered map of protocol4 fields.
pub type WireMap = indexmap::IndexMap<String, String>;
