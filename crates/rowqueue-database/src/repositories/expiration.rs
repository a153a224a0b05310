//! Expired-row deletion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use rowqueue_core::error::{AppError, ErrorKind};
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::ExpirationStore;
use rowqueue_core::types::ExpiringTable;

/// Repository deleting rows whose `expire_at` has passed.
#[derive(Debug, Clone)]
pub struct ExpirationRepository {
    pool: PgPool,
}

impl ExpirationRepository {
    /// Create a new expiration repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExpirationStore for ExpirationRepository {
    async fn delete_expired(
        &self,
        table: ExpiringTable,
        now: DateTime<Utc>,
        batch_size: u32,
    ) -> AppResult<u64> {
        // Table names come from a closed enum, never from input.
        let sql = format!(
            "DELETE FROM \"{name}\" WHERE id IN ( \
                 SELECT id FROM \"{name}\" WHERE expire_at <= $1 \
                 ORDER BY id LIMIT $2 FOR UPDATE SKIP LOCKED \
             )",
            name = table.table_name()
        );

        let result = sqlx::query(&sql)
            .bind(now)
            .bind(i64::from(batch_size))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to delete expired rows from {table}"),
                    e,
                )
            })?;
        Ok(result.rows_affected())
    }
}
