//! Job executor: dispatches jobs to registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use rowqueue_core::error::AppError;
use rowqueue_core::types::{Job, JobId};

use crate::client::Invocation;

/// Everything a handler gets to see about the job it runs.
#[derive(Debug, Clone)]
pub struct JobContext {
    /// Job being performed.
    pub job_id: JobId,
    /// Decoded invocation.
    pub invocation: Invocation,
    /// Decoded arguments.
    pub arguments: Value,
    /// Fires when the worker is shutting down.
    pub cancel: CancellationToken,
}

/// Trait for job handler implementations.
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// The job type this handler processes.
    fn job_type(&self) -> &str;

    /// Perform the job. The returned value is stored with the `Succeeded`
    /// state.
    async fn execute(&self, context: &JobContext) -> Result<Option<Value>, JobExecutionError>;
}

/// Error from job execution.
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// The job ran and failed.
    #[error("Job failed: {0}")]
    Failed(String),

    /// The job stopped because the worker is shutting down; it goes back
    /// to its queue.
    #[error("Job cancelled")]
    Cancelled,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// Dispatches jobs to the appropriate handler based on their job type.
#[derive(Debug, Default)]
pub struct JobExecutor {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    /// Create an executor with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job handler, replacing any previous one for its type.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let job_type = handler.job_type().to_string();
        info!(job_type = %job_type, "Registered job handler");
        self.handlers.insert(job_type, handler);
    }

    /// Decode a job and run it on its handler.
    pub async fn execute(
        &self,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>, JobExecutionError> {
        let invocation = Invocation::from_job(job)?;
        let handler = self.handlers.get(&invocation.job_type).ok_or_else(|| {
            JobExecutionError::Failed(format!(
                "No handler registered for job type '{}'",
                invocation.job_type
            ))
        })?;
        let arguments: Value =
            serde_json::from_str(&job.arguments).map_err(AppError::from)?;

        let context = JobContext {
            job_id: job.id,
            invocation,
            arguments,
            cancel: cancel.clone(),
        };
        handler.execute(&context).await
    }
}
