//! Server heartbeat configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for server liveness records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Seconds between heartbeats.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Servers silent for longer than this many seconds are removed.
    #[serde(default = "default_server_timeout")]
    pub server_timeout_seconds: u64,
}

impl ServerConfig {
    /// Heartbeat interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    /// Staleness bound for server records.
    pub fn server_timeout(&self) -> Duration {
        Duration::from_secs(self.server_timeout_seconds)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: default_heartbeat_interval(),
            server_timeout_seconds: default_server_timeout(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_server_timeout() -> u64 {
    300
}
