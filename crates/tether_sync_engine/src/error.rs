//! Error types for the sync engine.

use tether_core::CoreError;
use tether_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A body could not be framed or unframed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Item or cipher error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Server rejected the request.
    #[error("server error: {0}")]
    ServerError(String),

    /// The component failed to store an incoming item.
    #[error("component error: {0}")]
    Component(String),

    /// An item belongs to another component.
    #[error("item belongs to component {found:?}, expected {expected:?}")]
    WrongComponent {
        /// This coordinator's component.
        expected: String,
        /// The item's component.
        found: String,
    },

    /// A flush is already in flight.
    #[error("flush {id} is already in flight")]
    FlushInFlight {
        /// Ticket id of the in-flight flush.
        id: u64,
    },

    /// No in-flight flush has this ticket id.
    #[error("no flush {id} in flight")]
    UnknownFlush {
        /// The ticket id given.
        id: u64,
    },

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// Not connected.
    #[error("not connected to server")]
    NotConnected,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::ServerError(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection lost").is_retryable());
        assert!(!SyncError::transport_fatal("invalid certificate").is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::ServerError("over quota".into()).is_retryable());
        assert!(!SyncError::NotConnected.is_retryable());
        assert!(!SyncError::FlushInFlight { id: 1 }.is_retryable());
        assert!(!SyncError::from(CoreError::IntegrityCheckFailed).is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::NotConnected;
        assert_eq!(err.to_string(), "not connected to server");

        let err = SyncError::WrongComponent {
            expected: "bookmarks".into(),
            found: "history".into(),
        };
        assert!(err.to_string().contains("bookmarks"));
        assert!(err.to_string().contains("history"));
    }
}
