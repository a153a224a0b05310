//! Queue fetcher: claims entries with a fetch token and settles them.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use rowqueue_core::config::QueueConfig;
use rowqueue_core::error::AppError;
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::{Clock, JobStore, QueueStore};
use rowqueue_core::types::{ClaimedJob, Job, QueueCounts, QueueEntry};

use crate::lock::DistributedLock;
use crate::polling::{poll_until, to_chrono, FixedInterval, PollPolicy};

/// Claims queue entries for workers.
///
/// A claim stays private to its holder for the invisibility timeout; after
/// that another fetcher may claim the same entry again, so delivery is
/// at-least-once.
#[derive(Debug, Clone)]
pub struct QueueFetcher {
    queue: Arc<dyn QueueStore>,
    jobs: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    invisibility: chrono::Duration,
    policy: Arc<dyn PollPolicy>,
    /// Serializes claims per queue when set.
    claim_lock: Option<(DistributedLock, Duration)>,
}

impl QueueFetcher {
    /// Create a fetcher with an explicit poll policy and no claim lock.
    pub fn new(
        queue: Arc<dyn QueueStore>,
        jobs: Arc<dyn JobStore>,
        clock: Arc<dyn Clock>,
        invisibility_timeout: Duration,
        policy: Arc<dyn PollPolicy>,
    ) -> AppResult<Self> {
        if invisibility_timeout.is_zero() {
            return Err(AppError::configuration(
                "Invisibility timeout must be positive",
            ));
        }
        Ok(Self {
            queue,
            jobs,
            clock,
            invisibility: to_chrono(invisibility_timeout, "queue.invisibility_timeout_seconds")?,
            policy,
            claim_lock: None,
        })
    }

    /// Create a fetcher from configuration. `lock` is used only when
    /// `use_claim_lock` is set.
    pub fn from_config(
        queue: Arc<dyn QueueStore>,
        jobs: Arc<dyn JobStore>,
        clock: Arc<dyn Clock>,
        lock: DistributedLock,
        config: &QueueConfig,
    ) -> AppResult<Self> {
        let policy = FixedInterval::new(config.poll_interval(), config.jitter());
        let fetcher = Self::new(
            queue,
            jobs,
            clock,
            config.invisibility_timeout(),
            Arc::new(policy),
        )?;
        Ok(if config.use_claim_lock {
            fetcher.with_claim_lock(lock, config.claim_lock_timeout())
        } else {
            fetcher
        })
    }

    /// Serialize claims on each queue through `lock` on `queue:<name>`.
    pub fn with_claim_lock(mut self, lock: DistributedLock, timeout: Duration) -> Self {
        self.claim_lock = Some((lock, timeout));
        self
    }

    /// Claim the oldest claimable entry from the first queue (in the given
    /// order) that has one, waiting up to `timeout`.
    pub async fn dequeue(
        &self,
        queues: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> AppResult<ClaimedJob> {
        if queues.is_empty() {
            return Err(AppError::validation("At least one queue is required"));
        }
        if let Some(blank) = queues.iter().find(|q| q.trim().is_empty()) {
            return Err(AppError::validation(format!("Invalid queue name '{blank}'")));
        }

        poll_until("dequeue", self.policy.as_ref(), timeout, cancel, || {
            self.try_dequeue(queues, cancel)
        })
        .await
    }

    async fn try_dequeue(
        &self,
        queues: &[String],
        cancel: &CancellationToken,
    ) -> AppResult<Option<ClaimedJob>> {
        let token = Uuid::new_v4().to_string();
        for queue in queues {
            if let Some(entry) = self.claim_from(queue, &token, cancel).await? {
                let claimed = ClaimedJob::try_from(entry)?;
                debug!(
                    queue = %claimed.queue,
                    job_id = %claimed.job_id,
                    entry_id = %claimed.entry_id,
                    "Claimed queue entry"
                );
                return Ok(Some(claimed));
            }
        }
        Ok(None)
    }

    async fn claim_from(
        &self,
        queue: &str,
        token: &str,
        cancel: &CancellationToken,
    ) -> AppResult<Option<QueueEntry>> {
        let Some((lock, lock_timeout)) = &self.claim_lock else {
            return self.try_claim(queue, token).await;
        };

        let resource = format!("queue:{queue}");
        let lease = match lock.acquire(&resource, *lock_timeout, cancel).await {
            Ok(lease) => lease,
            Err(e) if e.is_timeout() => {
                debug!(queue, "Claim lock busy, skipping queue this attempt");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let claimed = self.try_claim(queue, token).await;
        if let Err(e) = lock.release(&lease).await {
            warn!(queue, error = %e, "Failed to release claim lock");
        }
        claimed
    }

    async fn try_claim(&self, queue: &str, token: &str) -> AppResult<Option<QueueEntry>> {
        let now = self.clock.now();
        self.queue
            .try_claim(queue, now - self.invisibility, now, token)
            .await
    }

    /// Remove a finished entry. Returns `false` if the claim was lost to
    /// another fetcher after the invisibility timeout.
    pub async fn acknowledge(&self, claimed: &ClaimedJob) -> AppResult<bool> {
        let removed = self
            .queue
            .acknowledge(claimed.entry_id, &claimed.fetch_token)
            .await?;
        if !removed {
            debug!(
                entry_id = %claimed.entry_id,
                job_id = %claimed.job_id,
                "Fetch token no longer matches, entry was re-claimed elsewhere"
            );
        }
        Ok(removed)
    }

    /// Return an entry to its queue. Returns `false` if the claim was lost.
    pub async fn requeue(&self, claimed: &ClaimedJob) -> AppResult<bool> {
        let requeued = self
            .queue
            .requeue(claimed.entry_id, &claimed.fetch_token)
            .await?;
        if !requeued {
            debug!(
                entry_id = %claimed.entry_id,
                job_id = %claimed.job_id,
                "Fetch token no longer matches, not requeueing"
            );
        }
        Ok(requeued)
    }

    /// The job behind a claim, or `None` if it has already been swept.
    pub async fn job(&self, claimed: &ClaimedJob) -> AppResult<Option<Job>> {
        self.jobs.find(claimed.job_id).await
    }

    /// Names of every queue that currently has entries.
    pub async fn queues(&self) -> AppResult<Vec<String>> {
        self.queue.queues().await
    }

    /// Waiting and claimed entry counts for `queue`.
    pub async fn counts(&self, queue: &str) -> AppResult<QueueCounts> {
        self.queue.counts(queue).await
    }
}
