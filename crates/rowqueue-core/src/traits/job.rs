//! Storage seam for jobs, parameters, and state history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::result::AppResult;
use crate::types::{Job, JobId, JobParameter, JobState, NewJob, NewState, StateId};

/// Job record operations.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a job and its parameters. The job starts without a state and
    /// with the job's provisional `expire_at`.
    async fn create(&self, job: &NewJob, now: DateTime<Utc>) -> AppResult<JobId>;

    /// Look a job up; `None` if it does not exist (or was swept).
    async fn find(&self, id: JobId) -> AppResult<Option<Job>>;

    /// Insert or overwrite a parameter.
    async fn set_parameter(&self, id: JobId, name: &str, value: Option<&str>) -> AppResult<()>;

    /// Read one parameter.
    async fn parameter(&self, id: JobId, name: &str) -> AppResult<Option<String>>;

    /// Read all parameters of a job.
    async fn parameters(&self, id: JobId) -> AppResult<Vec<JobParameter>>;

    /// Insert a `job_state` row and point the job at it, setting the job's
    /// `expire_at` to `expire_at`, all in one transaction.
    ///
    /// Fails with `NotFound` if the job does not exist.
    async fn append_state(
        &self,
        id: JobId,
        state: &NewState,
        expire_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> AppResult<StateId>;

    /// Clear the job's `expire_at` if its current state is still `state_id`.
    ///
    /// Returns `false` when the job has moved on (or is gone), in which case
    /// the later transition already decided its expiry.
    async fn persist(&self, id: JobId, state_id: StateId) -> AppResult<bool>;

    /// All state rows of a job in append order.
    async fn state_history(&self, id: JobId) -> AppResult<Vec<JobState>>;

    /// Number of jobs whose current state is `state_name`.
    async fn count_by_state(&self, state_name: &str) -> AppResult<i64>;
}
