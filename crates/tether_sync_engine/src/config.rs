//! Configuration for the sync coordinator.

use rand::Rng;
use std::time::Duration;

/// Configuration for one component's coordinator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// The component whose items this coordinator handles.
    pub component_id: String,
    /// Maximum number of items per pushed batch.
    pub push_batch_size: usize,
    /// Retry configuration.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(component_id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            push_batch_size: 100,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the push batch size. Zero is treated as one.
    pub fn with_push_batch_size(mut self, size: usize) -> Self {
        self.push_batch_size = size.max(1);
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Longest run of doublings before a delay stops growing.
const MAX_DOUBLINGS: u32 = 16;

/// How failed pushes and sync cycles are retried.
///
/// Only errors the transport marks retryable are retried. A failed push
/// aborts its batch back into the queue, beneath anything recorded since,
/// so the next attempt sends the merged, newest state.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts in total, the first one included.
    pub max_attempts: u32,
    /// Wait before the first retry. Each later retry waits twice as long.
    pub initial_delay: Duration,
    /// Ceiling on any single wait.
    pub max_delay: Duration,
    /// Lengthens each wait by a random amount, up to a quarter of it.
    pub jitter: bool,
}

impl RetryConfig {
    /// Allows `max_attempts` attempts with the default delays.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }

    /// A single attempt.
    pub fn no_retry() -> Self {
        Self {
            jitter: false,
            ..Self::new(1)
        }
    }

    /// Sets the wait before the first retry.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// The wait before retry number `retry`; zero before the first attempt.
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let doublings = (retry - 1).min(MAX_DOUBLINGS);
        let delay = self
            .initial_delay
            .saturating_mul(1 << doublings)
            .min(self.max_delay);
        if !self.jitter {
            return delay;
        }

        let spread = u64::try_from(delay.as_millis() / 4).unwrap_or(u64::MAX);
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
