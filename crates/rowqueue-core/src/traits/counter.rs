//! Storage seam for raw and aggregated counters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::result::AppResult;
use crate::types::AggregatedCounter;

/// Counter operations.
#[async_trait]
pub trait CounterStore: Send + Sync + std::fmt::Debug + 'static {
    /// Record one signed increment.
    async fn increment(
        &self,
        key: &str,
        delta: i64,
        expire_at: Option<DateTime<Utc>>,
    ) -> AppResult<()>;

    /// Logical value: aggregated total plus unfolded raw rows.
    async fn value(&self, key: &str) -> AppResult<i64>;

    /// The aggregated row for `key`.
    async fn aggregated(&self, key: &str) -> AppResult<Option<AggregatedCounter>>;

    /// Number of unfolded raw rows for `key`.
    async fn raw_count(&self, key: &str) -> AppResult<i64>;

    /// Fold up to `batch_size` raw rows into the aggregated table and delete
    /// them, atomically. Returns the number of raw rows folded.
    async fn fold(&self, batch_size: u32) -> AppResult<u64>;
}
