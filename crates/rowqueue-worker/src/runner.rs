//! Worker runner: slots that dequeue jobs and execute them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use rowqueue_core::config::WorkerConfig;
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::{Clock, CounterStore};
use rowqueue_core::types::{state, ClaimedJob, NewState};

use crate::executor::{JobExecutionError, JobExecutor};
use crate::fetcher::QueueFetcher;
use crate::state::StateMachine;

/// Daily statistics counters are kept this long.
const DAILY_STATS_RETENTION_DAYS: i64 = 30;

/// Failure reasons are stored in a bounded column; details go to the data.
const FAILED_REASON: &str = "An error occurred while performing the job";

/// Main worker runner that polls queues and executes jobs.
#[derive(Debug)]
pub struct WorkerRunner {
    fetcher: Arc<QueueFetcher>,
    states: Arc<StateMachine>,
    counters: Arc<dyn CounterStore>,
    executor: Arc<JobExecutor>,
    clock: Arc<dyn Clock>,
    config: WorkerConfig,
    worker_id: String,
    queues: Vec<String>,
}

impl WorkerRunner {
    /// Create a new worker runner polling `default` only.
    pub fn new(
        fetcher: Arc<QueueFetcher>,
        states: Arc<StateMachine>,
        counters: Arc<dyn CounterStore>,
        executor: Arc<JobExecutor>,
        clock: Arc<dyn Clock>,
        config: WorkerConfig,
        worker_id: String,
    ) -> Self {
        Self {
            fetcher,
            states,
            counters,
            executor,
            clock,
            config,
            worker_id,
            queues: vec!["default".to_string()],
        }
    }

    /// Set the queues to poll, in priority order.
    pub fn with_queues(mut self, queues: Vec<String>) -> Self {
        self.queues = queues;
        self
    }

    /// Run until `cancel` fires, then wait up to the shutdown grace period
    /// for in-flight jobs.
    pub async fn run(&self, cancel: CancellationToken) {
        let concurrency = self.config.concurrency.max(1);
        info!(
            worker_id = %self.worker_id,
            concurrency,
            queues = ?self.queues,
            "Worker started"
        );

        let slots = join_all((0..concurrency).map(|slot| self.slot(slot, &cancel)));
        tokio::pin!(slots);

        let grace = self.config.shutdown_grace();
        tokio::select! {
            _ = &mut slots => {}
            _ = async {
                cancel.cancelled().await;
                info!(worker_id = %self.worker_id, "Waiting for in-flight jobs to complete");
                tokio::time::sleep(grace).await;
            } => {
                warn!(
                    worker_id = %self.worker_id,
                    grace_secs = grace.as_secs(),
                    "Shutdown grace elapsed, abandoning in-flight jobs"
                );
            }
        }

        info!(worker_id = %self.worker_id, "Worker shut down complete");
    }

    async fn slot(&self, slot: usize, cancel: &CancellationToken) {
        let timeout = self.config.dequeue_timeout();
        while !cancel.is_cancelled() {
            match self.fetcher.dequeue(&self.queues, timeout, cancel).await {
                Ok(claimed) => {
                    if let Err(e) = self.process(&claimed, cancel).await {
                        error!(
                            slot,
                            job_id = %claimed.job_id,
                            entry_id = %claimed.entry_id,
                            error = %e,
                            "Failed to process job, it will be retried after the invisibility timeout"
                        );
                    }
                }
                Err(e) if e.is_timeout() => {}
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    error!(slot, error = %e, "Failed to dequeue job");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(timeout) => {}
                    }
                }
            }
        }
    }

    /// Perform one claimed job and settle its queue entry.
    async fn process(&self, claimed: &ClaimedJob, cancel: &CancellationToken) -> AppResult<()> {
        let Some(job) = self.fetcher.job(claimed).await? else {
            warn!(
                job_id = %claimed.job_id,
                entry_id = %claimed.entry_id,
                "Queue entry refers to a job that no longer exists, discarding"
            );
            self.fetcher.acknowledge(claimed).await?;
            return Ok(());
        };

        let processing = NewState::new(state::PROCESSING)
            .with_data(json!({ "worker_id": self.worker_id, "queue": claimed.queue }).to_string());
        self.states.append_state(job.id, processing).await?;

        info!(job_id = %job.id, queue = %claimed.queue, "Processing job");
        match self.executor.execute(&job, cancel).await {
            Ok(result) => {
                let succeeded = NewState::new(state::SUCCEEDED)
                    .with_data(json!({ "result": result }).to_string());
                self.states.append_state(job.id, succeeded).await?;
                self.record_stat(state::SUCCEEDED).await?;
                info!(job_id = %job.id, "Job succeeded");
            }
            Err(JobExecutionError::Cancelled) => {
                let enqueued = NewState::new(state::ENQUEUED)
                    .with_reason("Worker shutting down")
                    .with_data(json!({ "queue": claimed.queue }).to_string());
                self.states.append_state(job.id, enqueued).await?;
                self.fetcher.requeue(claimed).await?;
                info!(job_id = %job.id, "Job cancelled and returned to its queue");
                return Ok(());
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Job failed");
                let failed = NewState::new(state::FAILED)
                    .with_reason(FAILED_REASON)
                    .with_data(json!({ "message": e.to_string() }).to_string());
                self.states.append_state(job.id, failed).await?;
                self.record_stat(state::FAILED).await?;
            }
        }

        self.fetcher.acknowledge(claimed).await?;
        Ok(())
    }

    /// Bump the all-time and the daily counter for an outcome.
    async fn record_stat(&self, outcome: &str) -> AppResult<()> {
        let name = outcome.to_lowercase();
        let now = self.clock.now();
        self.counters
            .increment(&format!("stats:{name}"), 1, None)
            .await?;
        self.counters
            .increment(
                &daily_key(&name, now),
                1,
                Some(now + chrono::Duration::days(DAILY_STATS_RETENTION_DAYS)),
            )
            .await
    }
}

fn daily_key(name: &str, now: DateTime<Utc>) -> String {
    format!("stats:{name}:{}", now.format("%Y-%m-%d"))
}
