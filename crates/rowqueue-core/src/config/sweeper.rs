//! Expiration sweeper configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the expiration and counter-folding sweeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Whether this process runs the sweeper.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between sweeper passes.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    /// Maximum rows touched per statement.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Run each pass under the `lock:expirationmanager` distributed lock.
    #[serde(default = "default_true")]
    pub use_lock: bool,
}

impl SweeperConfig {
    /// Interval between passes.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: default_interval(),
            batch_size: default_batch_size(),
            use_lock: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    1800
}

fn default_batch_size() -> u32 {
    1000
}
