//! Shared fixtures for worker scenario tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use rowqueue_core::traits::{Clock, ManualClock};
use rowqueue_core::types::state;
use rowqueue_database::Storage;
use rowqueue_worker::{
    BackgroundJobClient, DistributedLock, FixedInterval, QueueFetcher, StateMachine,
};

pub const STALENESS: Duration = Duration::from_secs(600);
pub const INVISIBILITY: Duration = Duration::from_secs(1800);
pub const RETENTION: Duration = Duration::from_secs(3600);
pub const CREATION_EXPIRY: Duration = Duration::from_secs(30 * 86_400);
pub const POLL: Duration = Duration::from_millis(100);

/// In-memory stores plus a clock that only moves when told to.
pub struct Harness {
    pub storage: Storage,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        Self {
            storage: Storage::memory(),
            clock: Arc::new(ManualClock::new(start)),
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn lock(&self) -> DistributedLock {
        DistributedLock::new(
            self.storage.locks.clone(),
            self.clock(),
            STALENESS,
            Arc::new(FixedInterval::new(POLL, Duration::ZERO)),
        )
        .unwrap()
    }

    pub fn fetcher(&self) -> QueueFetcher {
        QueueFetcher::new(
            self.storage.queue.clone(),
            self.storage.jobs.clone(),
            self.clock(),
            INVISIBILITY,
            Arc::new(FixedInterval::new(POLL, Duration::ZERO)),
        )
        .unwrap()
    }

    pub fn states(&self) -> StateMachine {
        StateMachine::new(
            self.storage.jobs.clone(),
            self.clock(),
            RETENTION,
            [state::SUCCEEDED, state::DELETED],
        )
        .unwrap()
    }

    pub fn client(&self) -> BackgroundJobClient {
        BackgroundJobClient::new(
            self.storage.jobs.clone(),
            self.storage.queue.clone(),
            self.clock(),
            CREATION_EXPIRY,
        )
        .unwrap()
    }
}

pub fn queues(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}
