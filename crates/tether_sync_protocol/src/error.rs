//! Error types for the sync protocol.

use tether_codec::CodecError;
use tether_core::CoreError;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while framing or unframing sync messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// protocol4 framing error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Item or cipher error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// The body was produced by an unsupported protocol version.
    #[error("unsupported protocol version {found:?}")]
    UnsupportedVersion {
        /// The version found in the body.
        found: String,
    },

    /// A required field is absent.
    #[error("missing field {field:?}")]
    MissingField {
        /// Name of the field.
        field: String,
    },

    /// A field has an unusable value.
    #[error("invalid field {field:?}: {message}")]
    InvalidField {
        /// Name of the field.
        field: String,
        /// Description of the problem.
        message: String,
    },

    /// A property must be sealed but no cipher is configured.
    #[error("property {property:?} is sensitive but no cipher is configured")]
    MissingCipher {
        /// Name of the property.
        property: String,
    },
}

impl ProtocolError {
    /// Create a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}
