//! Counter repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use rowqueue_core::error::{AppError, ErrorKind};
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::CounterStore;
use rowqueue_core::types::AggregatedCounter;

/// Folds a batch of raw rows into `aggregated_counter` and deletes them.
///
/// Both data-modifying CTEs run in the same statement snapshot, so the
/// delete and the upsert commit or roll back together.
const FOLD_SQL: &str = "\
WITH batch AS (
    DELETE FROM counter
    WHERE id IN (
        SELECT id FROM counter ORDER BY id LIMIT $1 FOR UPDATE SKIP LOCKED
    )
    RETURNING key, value, expire_at
), folded AS (
    INSERT INTO aggregated_counter (key, value, expire_at)
    SELECT key, SUM(value)::BIGINT, MAX(expire_at) FROM batch GROUP BY key
    ON CONFLICT (key) DO UPDATE SET
        value = aggregated_counter.value + EXCLUDED.value,
        expire_at = GREATEST(aggregated_counter.expire_at, EXCLUDED.expire_at)
    RETURNING 1
)
SELECT COUNT(*) FROM batch";

/// Repository for `counter` and `aggregated_counter` rows.
#[derive(Debug, Clone)]
pub struct CounterRepository {
    pool: PgPool,
}

impl CounterRepository {
    /// Create a new counter repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CounterStore for CounterRepository {
    async fn increment(
        &self,
        key: &str,
        delta: i64,
        expire_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        sqlx::query("INSERT INTO counter (key, value, expire_at) VALUES ($1, $2, $3)")
            .bind(key)
            .bind(delta)
            .bind(expire_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to increment counter", e)
            })?;
        Ok(())
    }

    async fn value(&self, key: &str) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT \
                 COALESCE((SELECT value FROM aggregated_counter WHERE key = $1), 0) + \
                 COALESCE((SELECT SUM(value) FROM counter WHERE key = $1), 0)::BIGINT",
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read counter", e))
    }

    async fn aggregated(&self, key: &str) -> AppResult<Option<AggregatedCounter>> {
        sqlx::query_as::<_, AggregatedCounter>(
            "SELECT key, value, expire_at FROM aggregated_counter WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to read aggregated counter", e)
        })
    }

    async fn raw_count(&self, key: &str) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM counter WHERE key = $1")
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count raw counters", e)
            })
    }

    async fn fold(&self, batch_size: u32) -> AppResult<u64> {
        let folded = sqlx::query_scalar::<_, i64>(FOLD_SQL)
            .bind(i64::from(batch_size))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to fold counters", e))?;
        Ok(u64::try_from(folded).unwrap_or(0))
    }
}
