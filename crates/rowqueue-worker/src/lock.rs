//! Advisory distributed lock over the `distributed_lock` table.
//!
//! A lease is held while its row exists. Rows older than the staleness
//! window are assumed abandoned and may be taken over, so a holder that
//! runs longer than the window can briefly overlap with a new one.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use rowqueue_core::config::LockConfig;
use rowqueue_core::error::AppError;
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::{Clock, LockStore};
use rowqueue_core::types::LockLease;

use crate::polling::{poll_until, to_chrono, FixedInterval, PollPolicy};

/// Acquires and releases leases on named resources.
#[derive(Debug, Clone)]
pub struct DistributedLock {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
    staleness: chrono::Duration,
    policy: Arc<dyn PollPolicy>,
    default_timeout: Duration,
}

impl DistributedLock {
    /// Create a lock with an explicit poll policy.
    pub fn new(
        store: Arc<dyn LockStore>,
        clock: Arc<dyn Clock>,
        staleness: Duration,
        policy: Arc<dyn PollPolicy>,
    ) -> AppResult<Self> {
        if staleness.is_zero() {
            return Err(AppError::configuration("Lock staleness must be positive"));
        }
        Ok(Self {
            store,
            clock,
            staleness: to_chrono(staleness, "lock.staleness_seconds")?,
            policy,
            default_timeout: LockConfig::default().acquire_timeout(),
        })
    }

    /// Create a lock from configuration with a jittered fixed poll interval.
    pub fn from_config(
        store: Arc<dyn LockStore>,
        clock: Arc<dyn Clock>,
        config: &LockConfig,
    ) -> AppResult<Self> {
        let policy = FixedInterval::new(config.poll_interval(), config.jitter());
        let lock = Self::new(store, clock, config.staleness(), Arc::new(policy))?;
        Ok(lock.with_default_timeout(config.acquire_timeout()))
    }

    /// Timeout used by [`DistributedLock::acquire_default`].
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Wait until `resource` is free (or stale) and take it.
    ///
    /// Fails with `Timeout` once `timeout` elapses and with `Cancelled` when
    /// `cancel` fires. A zero `timeout` makes a single attempt.
    pub async fn acquire(
        &self,
        resource: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> AppResult<LockLease> {
        if resource.is_empty() {
            return Err(AppError::validation("Lock resource must not be empty"));
        }

        let what = format!("lock '{resource}'");
        poll_until(&what, self.policy.as_ref(), timeout, cancel, || {
            self.try_acquire(resource)
        })
        .await
    }

    /// [`DistributedLock::acquire`] with the configured acquire timeout.
    pub async fn acquire_default(
        &self,
        resource: &str,
        cancel: &CancellationToken,
    ) -> AppResult<LockLease> {
        self.acquire(resource, self.default_timeout, cancel).await
    }

    async fn try_acquire(&self, resource: &str) -> AppResult<Option<LockLease>> {
        let now = self.clock.now();
        if self.store.try_insert(resource, now).await? {
            debug!(resource, "Lock acquired");
            return Ok(Some(LockLease {
                resource: resource.to_string(),
                acquired_at: now,
                reclaimed: false,
            }));
        }

        if self
            .store
            .reclaim_stale(resource, now - self.staleness, now)
            .await?
        {
            warn!(
                resource,
                staleness_secs = self.staleness.num_seconds(),
                "Reclaimed stale lock from a previous holder"
            );
            return Ok(Some(LockLease {
                resource: resource.to_string(),
                acquired_at: now,
                reclaimed: true,
            }));
        }

        Ok(None)
    }

    /// Give a lease back.
    ///
    /// Releasing a lease whose row was already reclaimed by someone else
    /// leaves the new holder's row untouched.
    pub async fn release(&self, lease: &LockLease) -> AppResult<()> {
        if self.store.remove(&lease.resource, lease.acquired_at).await? {
            debug!(resource = %lease.resource, "Lock released");
        } else {
            debug!(
                resource = %lease.resource,
                "Lock row already gone or reclaimed, nothing to release"
            );
        }
        Ok(())
    }

    /// Whether any lease is currently recorded for `resource`.
    pub async fn is_held(&self, resource: &str) -> AppResult<bool> {
        Ok(self.store.holder(resource).await?.is_some())
    }
}
