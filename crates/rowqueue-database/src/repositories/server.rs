//! Server heartbeat repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use rowqueue_core::error::{AppError, ErrorKind};
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::ServerStore;
use rowqueue_core::types::ServerRecord;

/// Repository for `server` rows.
#[derive(Debug, Clone)]
pub struct ServerRepository {
    pool: PgPool,
}

impl ServerRepository {
    /// Create a new server repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServerStore for ServerRepository {
    async fn announce(&self, id: &str, data: &str, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO server (id, data, last_heartbeat) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data, \
             last_heartbeat = EXCLUDED.last_heartbeat",
        )
        .bind(id)
        .bind(data)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to announce server", e))?;
        Ok(())
    }

    async fn heartbeat(&self, id: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query("UPDATE server SET last_heartbeat = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to heartbeat", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM server WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to remove server", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_timed_out(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM server WHERE last_heartbeat < $1")
            .bind(before)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to remove timed out servers", e)
            })?;
        Ok(result.rows_affected())
    }

    async fn servers(&self) -> AppResult<Vec<ServerRecord>> {
        sqlx::query_as::<_, ServerRecord>(
            "SELECT id, data, last_heartbeat FROM server ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list servers", e))
    }
}
