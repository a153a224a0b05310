//! Storage seam for server heartbeats.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::result::AppResult;
use crate::types::ServerRecord;

/// Server liveness records.
#[async_trait]
pub trait ServerStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert or replace a server row.
    async fn announce(&self, id: &str, data: &str, now: DateTime<Utc>) -> AppResult<()>;

    /// Touch `last_heartbeat`. Returns `false` if the server row is gone.
    async fn heartbeat(&self, id: &str, now: DateTime<Utc>) -> AppResult<bool>;

    /// Delete a server row.
    async fn remove(&self, id: &str) -> AppResult<bool>;

    /// Delete servers whose last heartbeat is older than `before`.
    async fn remove_timed_out(&self, before: DateTime<Utc>) -> AppResult<u64>;

    /// All registered servers.
    async fn servers(&self) -> AppResult<Vec<ServerRecord>>;
}
