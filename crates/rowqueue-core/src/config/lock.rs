//! Distributed lock configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the row-backed distributed lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Age in seconds after which a held lease may be reclaimed by others.
    #[serde(default = "default_staleness")]
    pub staleness_seconds: u64,
    /// Default time to wait for a lease before giving up.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
    /// Base delay between acquire attempts, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Maximum random jitter added to each delay, in milliseconds.
    #[serde(default = "default_jitter")]
    pub jitter_ms: u64,
}

impl LockConfig {
    /// Staleness window.
    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_seconds)
    }

    /// Default acquire timeout.
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    /// Poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Jitter bound.
    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            staleness_seconds: default_staleness(),
            acquire_timeout_seconds: default_acquire_timeout(),
            poll_interval_ms: default_poll_interval(),
            jitter_ms: default_jitter(),
        }
    }
}

fn default_staleness() -> u64 {
    600
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    100
}

fn default_jitter() -> u64 {
    50
}
