//! Configuration for recnodb
//!
//! Centralized configuration with sensible defaults.

use crate::lock::RetryPolicy;

/// Main configuration for a recnodb handle
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // File Layout (used only when creating a new file)
    // -------------------------------------------------------------------------
    /// Allocation granularity: every block starts at, and spans, a multiple
    /// of this many bytes. Existing files keep the value stored in their
    /// file header.
    pub chunk_size: u32,

    /// Fixed record size of the table embedded in the file head
    pub record_size: u32,

    // -------------------------------------------------------------------------
    // Locking
    // -------------------------------------------------------------------------
    /// How contended lock attempts are retried for internal operations
    /// (block appends). Lock calls made directly by callers never retry.
    pub lock_retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            record_size: 50,
            lock_retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the chunk size (in bytes)
    pub fn chunk_size(mut self, bytes: u32) -> Self {
        self.config.chunk_size = bytes;
        self
    }

    /// Set the fixed record size (in bytes)
    pub fn record_size(mut self, bytes: u32) -> Self {
        self.config.record_size = bytes;
        self
    }

    /// Set the lock retry policy
    pub fn lock_retry(mut self, policy: RetryPolicy) -> Self {
        self.config.lock_retry = policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
