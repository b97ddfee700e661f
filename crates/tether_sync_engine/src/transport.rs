//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// A sync transport moves protocol4 bodies to and from the sync server.
///
/// This trait abstracts the network layer (HTTP, auth headers, TLS), which
/// the coordinator never sees.
pub trait SyncTransport: Send + Sync {
    /// Fetches a batch body of server changes.
    ///
    /// An empty body means there is nothing new.
    fn pull(&self) -> SyncResult<String>;

    /// Sends a batch body and returns the server's acknowledgement body.
    fn push(&self, body: &str) -> SyncResult<String>;

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool;

    /// Closes the transport connection.
    fn close(&self) -> SyncResult<()>;
}

/// A mock transport for testing.
///
/// Pull and push answer with canned bodies. Push failures can be queued up
/// ahead of time and every pushed body is recorded.
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    pull_response: Mutex<Option<String>>,
    push_response: Mutex<Option<String>>,
    push_failures: Mutex<VecDeque<SyncError>>,
    pushed: Mutex<Vec<String>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            pull_response: Mutex::new(None),
            push_response: Mutex::new(None),
            push_failures: Mutex::new(VecDeque::new()),
            pushed: Mutex::new(Vec::new()),
        }
    }

    /// Sets the pull response body.
    pub fn set_pull_response(&self, body: impl Into<String>) {
        *self.pull_response.lock() = Some(body.into());
    }

    /// Sets the push acknowledgement body.
    pub fn set_push_response(&self, body: impl Into<String>) {
        *self.push_response.lock() = Some(body.into());
    }

    /// Makes the next push fail with `error`. Failures queue up in order.
    pub fn fail_next_push(&self, error: SyncError) {
        self.push_failures.lock().push_back(error);
    }

    /// Bodies of every push attempt, failed ones included.
    pub fn pushed_bodies(&self) -> Vec<String> {
        self.pushed.lock().clone()
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncTransport for MockTransport {
    fn pull(&self) -> SyncResult<String> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        Ok(self.pull_response.lock().clone().unwrap_or_default())
    }

    fn push(&self, body: &str) -> SyncResult<String> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.pushed.lock().push(body.to_string());
        if let Some(error) = self.push_failures.lock().pop_front() {
            return Err(error);
        }
        self.push_response
            .lock()
            .clone()
            .ok_or_else(|| SyncError::transport_fatal("no mock push response set"))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> SyncResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_transport_connection() {
        let transport = MockTransport::new();
        assert!(transport.is_connected());

        transport.set_connected(false);
        assert!(!transport.is_connected());

        transport.set_connected(true);
        transport.close().unwrap();
        assert!(!transport.is_connected());
    }

    #[test]
    fn mock_transport_not_connected_error() {
        let transport = MockTransport::new();
        transport.set_connected(false);

        assert!(matches!(transport.pull(), Err(SyncError::NotConnected)));
        assert!(matches!(transport.push(""), Err(SyncError::NotConnected)));
    }

    #[test]
    fn mock_transport_empty_pull() {
        let transport = MockTransport::new();
        assert_eq!(transport.pull().unwrap(), "");
    }

    #[test]
    fn mock_transport_scripted_failures() {
        let transport = MockTransport::new();
        transport.set_push_response("status:2:ok\n");
        transport.fail_next_push(SyncError::Timeout);

        assert!(matches!(transport.push("a"), Err(SyncError::Timeout)));
        assert_eq!(transport.push("b").unwrap(), "status:2:ok\n");
        assert_eq!(transport.pushed_bodies(), ["a", "b"]);
    }
}
