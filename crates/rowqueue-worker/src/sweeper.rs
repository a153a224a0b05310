//! Expiration sweeper: folds raw counters and deletes expired rows.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rowqueue_core::config::SweeperConfig;
use rowqueue_core::error::AppError;
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::{Clock, CounterStore, ExpirationStore};
use rowqueue_core::types::ExpiringTable;

use crate::lock::DistributedLock;

/// Lock resource guarding a sweeper pass.
pub const SWEEPER_LOCK_RESOURCE: &str = "lock:expirationmanager";

/// What one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Raw counter rows folded into aggregated counters.
    pub counters_folded: u64,
    /// Rows deleted per table, in sweep order.
    pub deleted: Vec<(ExpiringTable, u64)>,
    /// The pass did nothing because another process held the sweeper lock.
    pub skipped: bool,
}

impl SweepReport {
    /// Rows deleted across all tables.
    pub fn total_deleted(&self) -> u64 {
        self.deleted.iter().map(|(_, n)| n).sum()
    }

    /// Rows deleted from `table`.
    pub fn deleted_from(&self, table: ExpiringTable) -> u64 {
        self.deleted
            .iter()
            .find(|(t, _)| *t == table)
            .map_or(0, |(_, n)| *n)
    }
}

/// Periodic housekeeping over counters and expiring tables.
#[derive(Debug, Clone)]
pub struct ExpirationSweeper {
    counters: Arc<dyn CounterStore>,
    expiration: Arc<dyn ExpirationStore>,
    clock: Arc<dyn Clock>,
    lock: Option<DistributedLock>,
    batch_size: u32,
    interval: Duration,
}

impl ExpirationSweeper {
    /// Create a sweeper without a lock.
    pub fn new(
        counters: Arc<dyn CounterStore>,
        expiration: Arc<dyn ExpirationStore>,
        clock: Arc<dyn Clock>,
        batch_size: u32,
        interval: Duration,
    ) -> AppResult<Self> {
        if batch_size == 0 {
            return Err(AppError::configuration("Sweeper batch size must be positive"));
        }
        Ok(Self {
            counters,
            expiration,
            clock,
            lock: None,
            batch_size,
            interval,
        })
    }

    /// Create a sweeper from configuration. `lock` is used only when
    /// `use_lock` is set.
    pub fn from_config(
        counters: Arc<dyn CounterStore>,
        expiration: Arc<dyn ExpirationStore>,
        clock: Arc<dyn Clock>,
        lock: DistributedLock,
        config: &SweeperConfig,
    ) -> AppResult<Self> {
        let sweeper = Self::new(
            counters,
            expiration,
            clock,
            config.batch_size,
            config.interval(),
        )?;
        Ok(if config.use_lock {
            sweeper.with_lock(lock)
        } else {
            sweeper
        })
    }

    /// Run each pass under [`SWEEPER_LOCK_RESOURCE`].
    pub fn with_lock(mut self, lock: DistributedLock) -> Self {
        self.lock = Some(lock);
        self
    }

    /// One pass: fold counters, then delete rows expired as of `now`.
    ///
    /// When the sweeper lock is held elsewhere the pass is skipped.
    pub async fn run_once(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let Some(lock) = &self.lock else {
            return self.sweep(now).await;
        };

        let lease = match lock
            .acquire(SWEEPER_LOCK_RESOURCE, Duration::ZERO, &CancellationToken::new())
            .await
        {
            Ok(lease) => lease,
            Err(e) if e.is_timeout() => {
                debug!("Sweeper lock held by another process, skipping pass");
                return Ok(SweepReport {
                    skipped: true,
                    ..SweepReport::default()
                });
            }
            Err(e) => return Err(e),
        };

        let report = self.sweep(now).await;
        if let Err(e) = lock.release(&lease).await {
            warn!(error = %e, "Failed to release sweeper lock");
        }
        report
    }

    async fn sweep(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let mut report = SweepReport {
            counters_folded: self.fold_counters().await?,
            ..SweepReport::default()
        };

        for table in ExpiringTable::ALL {
            let deleted = self.expire_table(table, now).await?;
            if deleted > 0 {
                debug!(table = %table, deleted, "Removed expired rows");
            }
            report.deleted.push((table, deleted));
        }
        Ok(report)
    }

    async fn fold_counters(&self) -> AppResult<u64> {
        let mut total = 0;
        loop {
            let folded = self.counters.fold(self.batch_size).await?;
            total += folded;
            if folded < u64::from(self.batch_size) {
                return Ok(total);
            }
        }
    }

    async fn expire_table(&self, table: ExpiringTable, now: DateTime<Utc>) -> AppResult<u64> {
        let mut total = 0;
        loop {
            let deleted = self
                .expiration
                .delete_expired(table, now, self.batch_size)
                .await?;
            total += deleted;
            if deleted < u64::from(self.batch_size) {
                return Ok(total);
            }
        }
    }

    /// Sweep on the configured interval until `cancel` fires. Failures are
    /// logged and retried on the next interval.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            batch_size = self.batch_size,
            locked = self.lock.is_some(),
            "Expiration sweeper started"
        );

        loop {
            match self.run_once(self.clock.now()).await {
                Ok(report) if report.skipped => {}
                Ok(report) => info!(
                    counters_folded = report.counters_folded,
                    rows_deleted = report.total_deleted(),
                    "Sweeper pass complete"
                ),
                Err(e) => warn!(error = %e, "Sweeper pass failed, will retry next interval"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Expiration sweeper stopped");
    }
}
