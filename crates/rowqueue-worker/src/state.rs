//! Job state transitions and retention.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use rowqueue_core::config::JobConfig;
use rowqueue_core::error::AppError;
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::{Clock, JobStore};
use rowqueue_core::types::{JobId, JobState, NewState, StateId};

use crate::polling::to_chrono;

/// Appends states to a job's history and manages its expiry.
///
/// Reaching a terminal state schedules the job for deletion after the
/// retention period; any other state makes it persistent again. One writer
/// per job is assumed.
#[derive(Debug, Clone)]
pub struct StateMachine {
    jobs: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    retention: chrono::Duration,
    terminal: HashSet<String>,
}

impl StateMachine {
    /// Create a state machine.
    pub fn new<I, S>(
        jobs: Arc<dyn JobStore>,
        clock: Arc<dyn Clock>,
        retention: Duration,
        terminal_states: I,
    ) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            jobs,
            clock,
            retention: to_chrono(retention, "job.expiration_seconds")?,
            terminal: terminal_states.into_iter().map(Into::into).collect(),
        })
    }

    /// Create a state machine from configuration.
    pub fn from_config(
        jobs: Arc<dyn JobStore>,
        clock: Arc<dyn Clock>,
        config: &JobConfig,
    ) -> AppResult<Self> {
        Self::new(
            jobs,
            clock,
            config.expiration(),
            config.terminal_states.iter().cloned(),
        )
    }

    /// Whether `state_name` ends a job's life.
    pub fn is_terminal(&self, state_name: &str) -> bool {
        self.terminal.contains(state_name)
    }

    /// Record a transition and make it the job's current state.
    pub async fn append_state(&self, job_id: JobId, state: NewState) -> AppResult<StateId> {
        if state.name.trim().is_empty() {
            return Err(AppError::validation("State name must not be empty"));
        }

        let now = self.clock.now();
        let expire_at = if self.is_terminal(&state.name) {
            Some(now + self.retention)
        } else {
            None
        };

        let state_id = self.jobs.append_state(job_id, &state, expire_at, now).await?;
        debug!(
            job_id = %job_id,
            state = %state.name,
            state_id = %state_id,
            expires = expire_at.is_some(),
            "Job state changed"
        );
        Ok(state_id)
    }

    /// Name of the job's current state, `None` if it never had one.
    pub async fn current_state(&self, job_id: JobId) -> AppResult<Option<String>> {
        let job = self
            .jobs
            .find(job_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Job {job_id} not found")))?;
        Ok(job.state_name)
    }

    /// Every state the job passed through, oldest first.
    pub async fn state_history(&self, job_id: JobId) -> AppResult<Vec<JobState>> {
        if self.jobs.find(job_id).await?.is_none() {
            return Err(AppError::not_found(format!("Job {job_id} not found")));
        }
        self.jobs.state_history(job_id).await
    }
}
