//! Producer client scenarios where the queue store misbehaves.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use rowqueue_core::error::{AppError, ErrorKind};
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::{Clock, QueueStore};
use rowqueue_core::types::{
    state, ExpiringTable, JobId, NewState, QueueCounts, QueueEntry, QueueEntryId,
};
use rowqueue_worker::{BackgroundJobClient, ExpirationSweeper, Invocation};

use common::{Harness, CREATION_EXPIRY};

/// A queue store whose connection is gone.
#[derive(Debug)]
struct DisconnectedQueue;

#[async_trait]
impl QueueStore for DisconnectedQueue {
    async fn push(&self, _queue: &str, _job_id: JobId) -> AppResult<QueueEntryId> {
        Err(AppError::database("connection refused"))
    }

    async fn try_claim(
        &self,
        _queue: &str,
        _invisible_before: DateTime<Utc>,
        _now: DateTime<Utc>,
        _fetch_token: &str,
    ) -> AppResult<Option<QueueEntry>> {
        Err(AppError::database("connection refused"))
    }

    async fn acknowledge(&self, _entry_id: QueueEntryId, _fetch_token: &str) -> AppResult<bool> {
        Err(AppError::database("connection refused"))
    }

    async fn requeue(&self, _entry_id: QueueEntryId, _fetch_token: &str) -> AppResult<bool> {
        Err(AppError::database("connection refused"))
    }

    async fn queues(&self) -> AppResult<Vec<String>> {
        Err(AppError::database("connection refused"))
    }

    async fn counts(&self, _queue: &str) -> AppResult<QueueCounts> {
        Err(AppError::database("connection refused"))
    }
}

#[tokio::test]
async fn test_failed_push_leaves_job_that_expires() {
    let h = Harness::new();
    let client = BackgroundJobClient::new(
        h.storage.jobs.clone(),
        Arc::new(DisconnectedQueue),
        h.clock(),
        CREATION_EXPIRY,
    )
    .unwrap();

    let err = client
        .create(&Invocation::new("noop"), &json!([]), &[], "default")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Database);

    assert_eq!(h.storage.jobs.count_by_state(state::ENQUEUED).await.unwrap(), 1);
    let created_at = h.clock.now();
    let expected = created_at + chrono::Duration::from_std(CREATION_EXPIRY).unwrap();
    let job = h.storage.jobs.find(JobId(1)).await.unwrap().unwrap();
    assert_eq!(job.expire_at, Some(expected));

    h.clock.advance(CREATION_EXPIRY + Duration::from_secs(1));
    let sweeper = ExpirationSweeper::new(
        h.storage.counters.clone(),
        h.storage.expiration.clone(),
        h.clock(),
        100,
        Duration::from_secs(60),
    )
    .unwrap();
    let report = sweeper.run_once(h.clock.now()).await.unwrap();

    assert_eq!(report.deleted_from(ExpiringTable::Job), 1);
    assert_eq!(h.storage.jobs.count_by_state(state::ENQUEUED).await.unwrap(), 0);
}

#[tokio::test]
async fn test_job_processed_before_creation_finishes_keeps_its_expiry() {
    let h = Harness::new();
    let states = h.states();
    let job_id = h
        .client()
        .create(&Invocation::new("noop"), &json!([]), &[], "default")
        .await
        .unwrap();
    let enqueued = h.storage.jobs.find(job_id).await.unwrap().unwrap().state_id.unwrap();

    states
        .append_state(job_id, NewState::new(state::SUCCEEDED))
        .await
        .unwrap();
    assert!(!h.storage.jobs.persist(job_id, enqueued).await.unwrap());
    assert!(h.storage.jobs.find(job_id).await.unwrap().unwrap().expire_at.is_some());
}

#[test]
fn test_creation_expiry_must_be_positive() {
    let h = Harness::new();
    let err = BackgroundJobClient::new(
        h.storage.jobs.clone(),
        h.storage.queue.clone(),
        h.clock(),
        Duration::ZERO,
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Configuration);
}
