//! Producer side: create jobs and place them on queues.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use rowqueue_core::config::JobConfig;
use rowqueue_core::error::AppError;
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::{Clock, JobStore, QueueStore};
use rowqueue_core::types::{state, Job, JobId, NewJob, NewState};

use crate::polling::to_chrono;

/// What to run: the handler a worker dispatches the job to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Registered handler type, e.g. `"send_email"`.
    pub job_type: String,
}

impl Invocation {
    /// Invocation of the handler registered for `job_type`.
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
        }
    }

    /// Decode the invocation stored on a job.
    pub fn from_job(job: &Job) -> AppResult<Self> {
        Ok(serde_json::from_str(&job.invocation_data)?)
    }
}

/// Creates jobs in the `Enqueued` state.
///
/// A job is created with a provisional expiry that is cleared only after its
/// queue entry exists. If creation fails half way, the sweeper removes the
/// job instead of leaving it enqueued on no queue forever.
#[derive(Debug, Clone)]
pub struct BackgroundJobClient {
    jobs: Arc<dyn JobStore>,
    queue: Arc<dyn QueueStore>,
    clock: Arc<dyn Clock>,
    creation_expiry: chrono::Duration,
}

impl BackgroundJobClient {
    /// Create a client whose unfinished creations expire after
    /// `creation_expiry`.
    pub fn new(
        jobs: Arc<dyn JobStore>,
        queue: Arc<dyn QueueStore>,
        clock: Arc<dyn Clock>,
        creation_expiry: Duration,
    ) -> AppResult<Self> {
        if creation_expiry.is_zero() {
            return Err(AppError::configuration(
                "Job creation expiry must be positive",
            ));
        }
        Ok(Self {
            jobs,
            queue,
            clock,
            creation_expiry: to_chrono(creation_expiry, "job.creation_expiration_seconds")?,
        })
    }

    /// Create a client from configuration.
    pub fn from_config(
        jobs: Arc<dyn JobStore>,
        queue: Arc<dyn QueueStore>,
        clock: Arc<dyn Clock>,
        config: &JobConfig,
    ) -> AppResult<Self> {
        Self::new(jobs, queue, clock, config.creation_expiration())
    }

    /// Create a job, mark it `Enqueued`, and push it onto `queue`.
    pub async fn create(
        &self,
        invocation: &Invocation,
        arguments: &Value,
        parameters: &[(String, String)],
        queue: &str,
    ) -> AppResult<JobId> {
        if invocation.job_type.trim().is_empty() {
            return Err(AppError::validation("Job type must not be empty"));
        }
        if queue.trim().is_empty() {
            return Err(AppError::validation("Queue name must not be empty"));
        }

        let now = self.clock.now();
        let provisional = now + self.creation_expiry;
        let job = NewJob {
            invocation_data: serde_json::to_string(invocation)?,
            arguments: serde_json::to_string(arguments)?,
            parameters: parameters.to_vec(),
            expire_at: Some(provisional),
        };
        let job_id = self.jobs.create(&job, now).await?;

        let enqueued = NewState::new(state::ENQUEUED)
            .with_reason("Triggered by client")
            .with_data(json!({ "queue": queue, "enqueued_at": now }).to_string());
        let state_id = self
            .jobs
            .append_state(job_id, &enqueued, Some(provisional), now)
            .await?;
        self.queue.push(queue, job_id).await?;

        if !self.jobs.persist(job_id, state_id).await? {
            debug!(job_id = %job_id, "Job left Enqueued before creation finished");
        }

        info!(
            job_id = %job_id,
            job_type = %invocation.job_type,
            queue,
            "Job enqueued"
        );
        Ok(job_id)
    }
}
