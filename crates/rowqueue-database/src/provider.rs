//! Storage bundle that dispatches to the configured backend.

use std::sync::Arc;

use tracing::info;

use rowqueue_core::config::{DatabaseConfig, StorageConfig};
use rowqueue_core::error::AppError;
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::{
    CollectionStore, CounterStore, ExpirationStore, JobStore, LockStore, QueueStore, ServerStore,
};

use crate::connection::DatabasePool;
use crate::migration::run_migrations;
use crate::repositories::{
    CollectionRepository, CounterRepository, ExpirationRepository, JobRepository, LockRepository,
    QueueRepository, ServerRepository,
};

/// Handles to every store of one backend.
///
/// The backend is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct Storage {
    /// Jobs, parameters, and state history.
    pub jobs: Arc<dyn JobStore>,
    /// Queue entries.
    pub queue: Arc<dyn QueueStore>,
    /// Distributed lock rows.
    pub locks: Arc<dyn LockStore>,
    /// Raw and aggregated counters.
    pub counters: Arc<dyn CounterStore>,
    /// Expired-row deletion.
    pub expiration: Arc<dyn ExpirationStore>,
    /// Hashes, sets, and lists.
    pub collections: Arc<dyn CollectionStore>,
    /// Server heartbeats.
    pub servers: Arc<dyn ServerStore>,
}

impl Storage {
    /// Build the storage bundle named by `storage.provider`.
    pub async fn from_config(
        storage: &StorageConfig,
        database: &DatabaseConfig,
    ) -> AppResult<Self> {
        match storage.provider.as_str() {
            "postgres" => {
                info!("Initializing PostgreSQL storage");
                let pool = DatabasePool::connect(database).await?;
                if database.run_migrations {
                    run_migrations(pool.pool()).await?;
                }
                Ok(Self::postgres(pool))
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory storage");
                Ok(Self::memory())
            }
            other => Err(AppError::configuration(format!(
                "Unknown storage provider: '{other}'. Supported: postgres, memory"
            ))),
        }
    }

    /// Stores backed by PostgreSQL.
    pub fn postgres(pool: DatabasePool) -> Self {
        let pool = pool.into_pool();
        Self {
            jobs: Arc::new(JobRepository::new(pool.clone())),
            queue: Arc::new(QueueRepository::new(pool.clone())),
            locks: Arc::new(LockRepository::new(pool.clone())),
            counters: Arc::new(CounterRepository::new(pool.clone())),
            expiration: Arc::new(ExpirationRepository::new(pool.clone())),
            collections: Arc::new(CollectionRepository::new(pool.clone())),
            servers: Arc::new(ServerRepository::new(pool)),
        }
    }

    /// Stores sharing one fresh in-memory table set.
    #[cfg(feature = "memory")]
    pub fn memory() -> Self {
        let store = crate::memory::MemoryStorage::new();
        Self {
            jobs: Arc::new(store.clone()),
            queue: Arc::new(store.clone()),
            locks: Arc::new(store.clone()),
            counters: Arc::new(store.clone()),
            expiration: Arc::new(store.clone()),
            collections: Arc::new(store.clone()),
            servers: Arc::new(store),
        }
    }
}
