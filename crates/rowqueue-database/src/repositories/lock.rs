//! Distributed lock repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use rowqueue_core::error::{AppError, ErrorKind};
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::LockStore;

/// Repository for `distributed_lock` rows.
#[derive(Debug, Clone)]
pub struct LockRepository {
    pool: PgPool,
}

impl LockRepository {
    /// Create a new lock repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LockStore for LockRepository {
    async fn try_insert(&self, resource: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO distributed_lock (resource, created_at) VALUES ($1, $2) \
             ON CONFLICT (resource) DO NOTHING",
        )
        .bind(resource)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to insert lock", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn reclaim_stale(
        &self,
        resource: &str,
        stale_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        // Replacing the stale row in place is equivalent to delete-then-insert
        // and only one of several reclaimers can match the old `created_at`.
        let result = sqlx::query(
            "UPDATE distributed_lock SET created_at = $3 \
             WHERE resource = $1 AND created_at < $2",
        )
        .bind(resource)
        .bind(stale_before)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reclaim lock", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove(&self, resource: &str, acquired_at: DateTime<Utc>) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM distributed_lock WHERE resource = $1 AND created_at = $2")
                .bind(resource)
                .bind(acquired_at)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to release lock", e)
                })?;
        Ok(result.rows_affected() == 1)
    }

    async fn holder(&self, resource: &str) -> AppResult<Option<DateTime<Utc>>> {
        sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT created_at FROM distributed_lock WHERE resource = $1",
        )
        .bind(resource)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read lock", e))
    }
}
