//! Hash, set, and list repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use rowqueue_core::error::{AppError, ErrorKind};
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::CollectionStore;
use rowqueue_core::types::{ExpiringTable, HashEntry, ListEntry, SetEntry};

/// Repository for the keyed auxiliary tables.
#[derive(Debug, Clone)]
pub struct CollectionRepository {
    pool: PgPool,
}

impl CollectionRepository {
    /// Create a new collection repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CollectionStore for CollectionRepository {
    async fn set_hash(&self, key: &str, fields: &[(String, String)]) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        for (field, value) in fields {
            sqlx::query(
                "INSERT INTO \"hash\" (key, field, value) VALUES ($1, $2, $3) \
                 ON CONFLICT (key, field) DO UPDATE SET value = EXCLUDED.value",
            )
            .bind(key)
            .bind(field)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to set hash field", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit hash", e))
    }

    async fn hash(&self, key: &str) -> AppResult<Vec<HashEntry>> {
        sqlx::query_as::<_, HashEntry>(
            "SELECT key, field, value, expire_at FROM \"hash\" WHERE key = $1 ORDER BY field",
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read hash", e))
    }

    async fn remove_hash(&self, key: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM \"hash\" WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to remove hash", e))?;
        Ok(result.rows_affected())
    }

    async fn add_to_set(&self, key: &str, value: &str, score: f64) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO \"set\" (key, value, score) VALUES ($1, $2, $3) \
             ON CONFLICT (key, value) DO UPDATE SET score = EXCLUDED.score",
        )
        .bind(key)
        .bind(value)
        .bind(score)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to add to set", e))?;
        Ok(())
    }

    async fn remove_from_set(&self, key: &str, value: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM \"set\" WHERE key = $1 AND value = $2")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to remove from set", e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_members(&self, key: &str) -> AppResult<Vec<SetEntry>> {
        sqlx::query_as::<_, SetEntry>(
            "SELECT key, value, score, expire_at FROM \"set\" WHERE key = $1 \
             ORDER BY score, value",
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read set", e))
    }

    async fn push_list(&self, key: &str, value: &str) -> AppResult<()> {
        sqlx::query("INSERT INTO \"list\" (key, value) VALUES ($1, $2)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to push to list", e))?;
        Ok(())
    }

    async fn list_range(&self, key: &str, start: u32, end: u32) -> AppResult<Vec<ListEntry>> {
        if end < start {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, ListEntry>(
            "SELECT id, key, value, expire_at FROM \"list\" WHERE key = $1 \
             ORDER BY id DESC OFFSET $2 LIMIT $3",
        )
        .bind(key)
        .bind(i64::from(start))
        .bind(i64::from(end - start) + 1)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read list", e))
    }

    async fn trim_list(&self, key: &str, start: u32, end: u32) -> AppResult<u64> {
        let keep = if end < start { 0 } else { i64::from(end - start) + 1 };
        let result = sqlx::query(
            "DELETE FROM \"list\" WHERE key = $1 AND id NOT IN ( \
                 SELECT id FROM \"list\" WHERE key = $1 \
                 ORDER BY id DESC OFFSET $2 LIMIT $3 \
             )",
        )
        .bind(key)
        .bind(i64::from(start))
        .bind(keep)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to trim list", e))?;
        Ok(result.rows_affected())
    }

    async fn expire_key(
        &self,
        table: ExpiringTable,
        key: &str,
        expire_at: Option<DateTime<Utc>>,
    ) -> AppResult<u64> {
        if table == ExpiringTable::Job {
            return Err(AppError::validation(
                "Job expiry is managed by state transitions",
            ));
        }
        let sql = format!(
            "UPDATE \"{}\" SET expire_at = $2 WHERE key = $1",
            table.table_name()
        );
        let result = sqlx::query(&sql)
            .bind(key)
            .bind(expire_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to set expiry on {table}"),
                    e,
                )
            })?;
        Ok(result.rows_affected())
    }
}
