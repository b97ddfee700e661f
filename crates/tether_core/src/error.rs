//! Error types for Tether core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Tether core operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A lookup key component is missing or unparseable.
    #[error("malformed lookup key: {message}")]
    MalformedKey {
        /// Description of the problem.
        message: String,
    },

    /// Key material has the wrong length.
    #[error("invalid key size: expected 20 or {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Actual size provided.
        actual: usize,
        /// Native key size.
        expected: usize,
    },

    /// Key derivation failed.
    #[error("key derivation failed: {message}")]
    KeyDerivationFailed {
        /// Description of the failure.
        message: String,
    },

    /// Encrypted value carries a format version this build cannot read.
    #[error("unknown cipher format version {version:?}")]
    UnknownFormatVersion {
        /// The version tag found on the value.
        version: String,
    },

    /// Encrypted value is not in `ciphertext|iv*version` form or has bad encoding.
    #[error("malformed ciphertext: {message}")]
    MalformedCiphertext {
        /// Description of the problem.
        message: String,
    },

    /// The recomputed MAC does not match the transmitted IV.
    #[error("integrity check failed: wrong key, wrong context or tampered value")]
    IntegrityCheckFailed,
}

impl CoreError {
    /// Create a malformed key error.
    pub fn malformed_key(message: impl Into<String>) -> Self {
        Self::MalformedKey {
            message: message.into(),
        }
    }

    /// Create an invalid key size error.
    pub fn invalid_key_size(actual: usize, expected: usize) -> Self {
        Self::InvalidKeySize { actual, expected }
    }

    /// Create a key derivation error.
    pub fn key_derivation_failed(message: impl Into<String>) -> Self {
        Self::KeyDerivationFailed {
            message: message.into(),
        }
    }

    /// Create a malformed ciphertext error.
    pub fn malformed_ciphertext(message: impl Into<String>) -> Self {
        Self::MalformedCiphertext {
            message: message.into(),
        }
    }

    /// Returns true for errors produced while opening an encrypted value.
    pub fn is_decryption_failure(&self) -> bool {
        matches!(
            self,
            CoreError::UnknownFormatVersion { .. }
                | CoreError::MalformedCiphertext { .. }
                | CoreError::IntegrityCheckFailed
        )
    }
}
