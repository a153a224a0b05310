//! Job repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use rowqueue_core::error::{AppError, ErrorKind};
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::JobStore;
use rowqueue_core::types::{Job, JobId, JobParameter, JobState, NewJob, NewState, StateId};

/// Repository for jobs, job parameters, and job state history.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn create(&self, job: &NewJob, now: DateTime<Utc>) -> AppResult<JobId> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let id = sqlx::query_scalar::<_, JobId>(
            "INSERT INTO job (invocation_data, arguments, created_at, expire_at) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&job.invocation_data)
        .bind(&job.arguments)
        .bind(now)
        .bind(job.expire_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create job", e))?;

        for (name, value) in &job.parameters {
            sqlx::query(
                "INSERT INTO job_parameter (job_id, name, value) VALUES ($1, $2, $3) \
                 ON CONFLICT (job_id, name) DO UPDATE SET value = EXCLUDED.value",
            )
            .bind(id)
            .bind(name)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to store job parameter", e)
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to commit job", e))?;
        Ok(id)
    }

    async fn find(&self, id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            "SELECT id, state_id, state_name, invocation_data, arguments, created_at, expire_at \
             FROM job WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job", e))
    }

    async fn set_parameter(&self, id: JobId, name: &str, value: Option<&str>) -> AppResult<()> {
        let result = sqlx::query(
            "INSERT INTO job_parameter (job_id, name, value) \
             SELECT $1, $2, $3 WHERE EXISTS (SELECT 1 FROM job WHERE id = $1) \
             ON CONFLICT (job_id, name) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(id)
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to set job parameter", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Job {id} not found")));
        }
        Ok(())
    }

    async fn parameter(&self, id: JobId, name: &str) -> AppResult<Option<String>> {
        sqlx::query_scalar::<_, Option<String>>(
            "SELECT value FROM job_parameter WHERE job_id = $1 AND name = $2",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map(Option::flatten)
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read job parameter", e))
    }

    async fn parameters(&self, id: JobId) -> AppResult<Vec<JobParameter>> {
        sqlx::query_as::<_, JobParameter>(
            "SELECT job_id, name, value FROM job_parameter WHERE job_id = $1 ORDER BY name",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list job parameters", e)
        })
    }

    async fn append_state(
        &self,
        id: JobId,
        state: &NewState,
        expire_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> AppResult<StateId> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let exists = sqlx::query_scalar::<_, JobId>("SELECT id FROM job WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock job", e))?;
        if exists.is_none() {
            return Err(AppError::not_found(format!("Job {id} not found")));
        }

        let state_id = sqlx::query_scalar::<_, StateId>(
            "INSERT INTO job_state (job_id, name, reason, created_at, data) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(id)
        .bind(&state.name)
        .bind(&state.reason)
        .bind(now)
        .bind(&state.data)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to append job state", e))?;

        sqlx::query("UPDATE job SET state_id = $2, state_name = $3, expire_at = $4 WHERE id = $1")
            .bind(id)
            .bind(state_id)
            .bind(&state.name)
            .bind(expire_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to update current state", e)
            })?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit state transition", e)
        })?;
        Ok(state_id)
    }

    async fn persist(&self, id: JobId, state_id: StateId) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE job SET expire_at = NULL WHERE id = $1 AND state_id = $2")
                .bind(id)
                .bind(state_id)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to persist job", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn state_history(&self, id: JobId) -> AppResult<Vec<JobState>> {
        sqlx::query_as::<_, JobState>(
            "SELECT id, job_id, name, reason, created_at, data FROM job_state \
             WHERE job_id = $1 ORDER BY id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load state history", e))
    }

    async fn count_by_state(&self, state_name: &str) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM job WHERE state_name = $1")
            .bind(state_name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count jobs", e))
    }
}
