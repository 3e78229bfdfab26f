//! Retry with backoff for contended locks
//!
//! Lock attempts never block, so waiting for a busy region is a policy the
//! caller opts into. Only `LockFailed` is retried; every other error is
//! returned on the spot.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;

/// Retry policy for contended lock attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included (0 behaves like 1)
    pub attempts: u32,
    /// Delay before the first retry; doubles on each further retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            base_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    pub fn no_retry() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn new(attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay to wait after the `retry`-th failed attempt (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails with a non-contention error, or
    /// the attempts are used up. The last error is returned.
    pub fn run<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let attempts = self.attempts.max(1);
        let mut retry = 0;
        loop {
            match op() {
                Err(e) if e.is_retryable() && retry + 1 < attempts => {
                    retry += 1;
                    let delay = self.delay_for(retry);
                    warn!(retry, attempts, delay_ms = delay.as_millis() as u64, error = %e, "lock contended, retrying");
                    thread::sleep(delay);
                }
                other => return other,
            }
        }
    }
}
