//! Storage seam for queue entries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::result::AppResult;
use crate::types::{JobId, QueueCounts, QueueEntry, QueueEntryId};

/// Queue entry operations.
#[async_trait]
pub trait QueueStore: Send + Sync + std::fmt::Debug + 'static {
    /// Place `job_id` on `queue`.
    async fn push(&self, queue: &str, job_id: JobId) -> AppResult<QueueEntryId>;

    /// Claim the oldest entry on `queue` that is unclaimed or whose claim
    /// is older than `invisible_before`, stamping it with `now` and
    /// `fetch_token`.
    ///
    /// Implementations must use a single conditional update so that two
    /// racing callers never claim the same entry.
    async fn try_claim(
        &self,
        queue: &str,
        invisible_before: DateTime<Utc>,
        now: DateTime<Utc>,
        fetch_token: &str,
    ) -> AppResult<Option<QueueEntry>>;

    /// Delete the entry if `fetch_token` still matches. Returns `false` on
    /// mismatch.
    async fn acknowledge(&self, entry_id: QueueEntryId, fetch_token: &str) -> AppResult<bool>;

    /// Clear the claim if `fetch_token` still matches. Returns `false` on
    /// mismatch.
    async fn requeue(&self, entry_id: QueueEntryId, fetch_token: &str) -> AppResult<bool>;

    /// Distinct queue names that have entries.
    async fn queues(&self) -> AppResult<Vec<String>>;

    /// Available and claimed entry counts for `queue`.
    async fn counts(&self, queue: &str) -> AppResult<QueueCounts>;
}
