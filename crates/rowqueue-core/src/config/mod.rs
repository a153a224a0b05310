//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section, and every section falls back to its defaults when omitted.

pub mod database;
pub mod job;
pub mod lock;
pub mod logging;
pub mod queue;
pub mod server;
pub mod storage;
pub mod sweeper;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::database::DatabaseConfig;
pub use self::job::JobConfig;
pub use self::lock::LockConfig;
pub use self::logging::LoggingConfig;
pub use self::queue::QueueConfig;
pub use self::server::ServerConfig;
pub use self::storage::StorageConfig;
pub use self::sweeper::SweeperConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Longest span, in seconds, that may be added to or subtracted from a
/// timestamp. Larger values overflow date arithmetic.
pub const MAX_SPAN_SECONDS: u64 = 100 * 365 * 86_400;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Storage backend selection.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Distributed lock settings.
    #[serde(default)]
    pub lock: LockConfig,
    /// Queue fetcher settings.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Job state retention settings.
    #[serde(default)]
    pub job: JobConfig,
    /// Expiration sweeper settings.
    #[serde(default)]
    pub sweeper: SweeperConfig,
    /// Background worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Server heartbeat settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `ROWQUEUE`
    /// (e.g. `ROWQUEUE__DATABASE__URL`).
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("ROWQUEUE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        let parsed: Self = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Reject settings the runtime cannot operate with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.queue.queues.is_empty() {
            return Err(AppError::configuration("queue.queues must not be empty"));
        }
        if self.queue.queues.iter().any(|q| q.trim().is_empty()) {
            return Err(AppError::configuration("queue names must not be blank"));
        }
        if self.sweeper.batch_size == 0 {
            return Err(AppError::configuration("sweeper.batch_size must be positive"));
        }
        if self.worker.concurrency == 0 {
            return Err(AppError::configuration("worker.concurrency must be positive"));
        }
        if self.lock.staleness_seconds == 0 {
            return Err(AppError::configuration("lock.staleness_seconds must be positive"));
        }
        if self.queue.invisibility_timeout_seconds == 0 {
            return Err(AppError::configuration(
                "queue.invisibility_timeout_seconds must be positive",
            ));
        }

        let spans = [
            ("lock.staleness_seconds", self.lock.staleness_seconds),
            (
                "queue.invisibility_timeout_seconds",
                self.queue.invisibility_timeout_seconds,
            ),
            ("job.expiration_seconds", self.job.expiration_seconds),
            (
                "job.creation_expiration_seconds",
                self.job.creation_expiration_seconds,
            ),
            ("server.server_timeout_seconds", self.server.server_timeout_seconds),
        ];
        if let Some((name, _)) = spans.iter().find(|(_, secs)| *secs > MAX_SPAN_SECONDS) {
            return Err(AppError::configuration(format!(
                "{name} must not exceed {MAX_SPAN_SECONDS} seconds"
            )));
        }
        Ok(())
    }
}
