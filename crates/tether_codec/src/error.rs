//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while framing or unframing protocol4 bodies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A field name cannot be represented on the wire.
    #[error("invalid field name {name:?}: {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The length prefix is not a decimal byte count.
    #[error("invalid length prefix at byte {offset}")]
    InvalidLength {
        /// Byte offset of the line that failed.
        offset: usize,
    },

    /// The body ended before a declared value did.
    #[error("unexpected end of input at byte {offset}")]
    UnexpectedEof {
        /// Byte offset of the truncated line.
        offset: usize,
    },

    /// A value was not followed by a line terminator.
    #[error("missing line terminator at byte {offset}")]
    MissingTerminator {
        /// Byte offset where the terminator was expected.
        offset: usize,
    },

    /// A length-framed value split a UTF-8 sequence.
    #[error("invalid UTF-8 in value at byte {offset}")]
    InvalidUtf8 {
        /// Byte offset of the value.
        offset: usize,
    },
}

impl CodecError {
    /// Create an invalid name error.
    pub fn invalid_name(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason,
        }
    }
}
