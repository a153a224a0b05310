//! Job state retention configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::state;

/// Settings for the job state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// How long a job in a terminal state is retained, in seconds.
    #[serde(default = "default_expiration")]
    pub expiration_seconds: u64,
    /// State names after which no further processing is expected.
    #[serde(default = "default_terminal_states")]
    pub terminal_states: Vec<String>,
    /// Expiry given to a job while it is being created, in seconds. Cleared
    /// once the job is on its queue.
    #[serde(default = "default_creation_expiration")]
    pub creation_expiration_seconds: u64,
}

impl JobConfig {
    /// Retention window for terminal jobs.
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_seconds)
    }

    /// Provisional expiry of a job that is not yet enqueued.
    pub fn creation_expiration(&self) -> Duration {
        Duration::from_secs(self.creation_expiration_seconds)
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            expiration_seconds: default_expiration(),
            terminal_states: default_terminal_states(),
            creation_expiration_seconds: default_creation_expiration(),
        }
    }
}

fn default_expiration() -> u64 {
    86_400
}

fn default_creation_expiration() -> u64 {
    30 * 86_400
}

fn default_terminal_states() -> Vec<String> {
    vec![state::SUCCEEDED.to_string(), state::DELETED.to_string()]
}
