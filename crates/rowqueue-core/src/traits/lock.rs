//! Storage seam for the distributed lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::result::AppResult;

/// Row-per-resource lock table operations.
///
/// Every method must be atomic with respect to concurrent callers: two
/// callers of [`LockStore::try_insert`] for the same absent resource never
/// both observe `true`.
#[async_trait]
pub trait LockStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a row for `resource` unless one exists. Returns `true` if this
    /// call inserted it.
    async fn try_insert(&self, resource: &str, now: DateTime<Utc>) -> AppResult<bool>;

    /// Delete the row for `resource` if it was created before
    /// `stale_before`, and insert a fresh row at `now` in the same
    /// transaction. Returns `true` if this call took over the lock.
    async fn reclaim_stale(
        &self,
        resource: &str,
        stale_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Delete the row a lease inserted. Returns `false` when that row is
    /// already gone (released or reclaimed by someone else).
    async fn remove(&self, resource: &str, acquired_at: DateTime<Utc>) -> AppResult<bool>;

    /// Creation time of the current holder's row, if any.
    async fn holder(&self, resource: &str) -> AppResult<Option<DateTime<Utc>>>;
}
