//! Queue fetcher configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for claiming queue entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queues to poll, highest priority first.
    #[serde(default = "default_queues")]
    pub queues: Vec<String>,
    /// Seconds after which an unacknowledged claim becomes claimable again.
    #[serde(default = "default_invisibility_timeout")]
    pub invisibility_timeout_seconds: u64,
    /// Base delay between empty polls, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Maximum random jitter added to each delay, in milliseconds.
    #[serde(default = "default_jitter")]
    pub jitter_ms: u64,
    /// Serialize claims per queue through the distributed lock.
    #[serde(default)]
    pub use_claim_lock: bool,
    /// How long one claim attempt waits for the per-queue lock, in milliseconds.
    #[serde(default = "default_claim_lock_timeout")]
    pub claim_lock_timeout_ms: u64,
}

impl QueueConfig {
    /// Claim expiry window.
    pub fn invisibility_timeout(&self) -> Duration {
        Duration::from_secs(self.invisibility_timeout_seconds)
    }

    /// Poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Jitter bound.
    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }

    /// Per-attempt wait for the claim lock.
    pub fn claim_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.claim_lock_timeout_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queues: default_queues(),
            invisibility_timeout_seconds: default_invisibility_timeout(),
            poll_interval_ms: default_poll_interval(),
            jitter_ms: default_jitter(),
            use_claim_lock: false,
            claim_lock_timeout_ms: default_claim_lock_timeout(),
        }
    }
}

fn default_queues() -> Vec<String> {
    vec!["default".to_string()]
}

fn default_invisibility_timeout() -> u64 {
    1800
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_jitter() -> u64 {
    100
}

fn default_claim_lock_timeout() -> u64 {
    1000
}
