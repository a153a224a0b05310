//! Storage seam for expiration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::result::AppResult;
use crate::types::ExpiringTable;

/// Expired-row deletion.
#[async_trait]
pub trait ExpirationStore: Send + Sync + std::fmt::Debug + 'static {
    /// Delete up to `batch_size` rows of `table` with `expire_at <= now`.
    /// Returns the number of rows deleted.
    async fn delete_expired(
        &self,
        table: ExpiringTable,
        now: DateTime<Utc>,
        batch_size: u32,
    ) -> AppResult<u64>;
}
