//! Queue entry repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use rowqueue_core::error::{AppError, ErrorKind};
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::QueueStore;
use rowqueue_core::types::{JobId, QueueCounts, QueueEntry, QueueEntryId};

/// Repository for `job_queue` rows.
#[derive(Debug, Clone)]
pub struct QueueRepository {
    pool: PgPool,
}

impl QueueRepository {
    /// Create a new queue repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueueStore for QueueRepository {
    async fn push(&self, queue: &str, job_id: JobId) -> AppResult<QueueEntryId> {
        sqlx::query_scalar::<_, QueueEntryId>(
            "INSERT INTO job_queue (job_id, queue) VALUES ($1, $2) RETURNING id",
        )
        .bind(job_id)
        .bind(queue)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to enqueue job", e))
    }

    async fn try_claim(
        &self,
        queue: &str,
        invisible_before: DateTime<Utc>,
        now: DateTime<Utc>,
        fetch_token: &str,
    ) -> AppResult<Option<QueueEntry>> {
        // The outer predicate is re-evaluated after the row lock, so a
        // concurrent claim that slipped in between loses the race cleanly.
        sqlx::query_as::<_, QueueEntry>(
            "UPDATE job_queue SET fetched_at = $3, fetch_token = $4 \
             WHERE id = ( \
                 SELECT id FROM job_queue \
                 WHERE queue = $1 AND (fetched_at IS NULL OR fetched_at < $2) \
                 ORDER BY id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) AND (fetched_at IS NULL OR fetched_at < $2) \
             RETURNING id, job_id, queue, fetched_at, fetch_token",
        )
        .bind(queue)
        .bind(invisible_before)
        .bind(now)
        .bind(fetch_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to claim queue entry", e))
    }

    async fn acknowledge(&self, entry_id: QueueEntryId, fetch_token: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM job_queue WHERE id = $1 AND fetch_token = $2")
            .bind(entry_id)
            .bind(fetch_token)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to acknowledge queue entry", e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn requeue(&self, entry_id: QueueEntryId, fetch_token: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE job_queue SET fetched_at = NULL, fetch_token = NULL \
             WHERE id = $1 AND fetch_token = $2",
        )
        .bind(entry_id)
        .bind(fetch_token)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to requeue entry", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn queues(&self) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT DISTINCT queue FROM job_queue ORDER BY queue")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list queues", e))
    }

    async fn counts(&self, queue: &str) -> AppResult<QueueCounts> {
        let (enqueued, fetched): (i64, i64) = sqlx::query_as(
            "SELECT \
                 COUNT(*) FILTER (WHERE fetched_at IS NULL), \
                 COUNT(*) FILTER (WHERE fetched_at IS NOT NULL) \
             FROM job_queue WHERE queue = $1",
        )
        .bind(queue)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count queue", e))?;

        Ok(QueueCounts {
            queue: queue.to_string(),
            enqueued,
            fetched,
        })
    }
}
