//! Distributed lock scenarios.

mod common;

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use rowqueue_core::config::LockConfig;
use rowqueue_core::error::ErrorKind;
use rowqueue_worker::DistributedLock;

use common::{Harness, STALENESS};

#[tokio::test(start_paused = true)]
async fn test_held_lock_times_out_then_succeeds_after_release() {
    let h = Harness::new();
    let lock = h.lock();
    let cancel = CancellationToken::new();

    let lease = lock
        .acquire("lock:report", Duration::from_secs(1), &cancel)
        .await
        .unwrap();
    assert!(!lease.reclaimed);

    let started = Instant::now();
    let err = lock
        .acquire("lock:report", Duration::from_secs(2), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(3));

    lock.release(&lease).await.unwrap();
    let started = Instant::now();
    lock.acquire("lock:report", Duration::from_secs(2), &cancel)
        .await
        .unwrap();
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_stale_lock_is_reclaimed_and_old_release_is_noop() {
    let h = Harness::new();
    let lock = h.lock();
    let cancel = CancellationToken::new();

    let original = lock
        .acquire("lock:expirationmanager", Duration::ZERO, &cancel)
        .await
        .unwrap();

    h.clock.advance(STALENESS + Duration::from_secs(1));
    let takeover = lock
        .acquire("lock:expirationmanager", Duration::ZERO, &cancel)
        .await
        .unwrap();
    assert!(takeover.reclaimed);

    lock.release(&original).await.unwrap();
    assert!(lock.is_held("lock:expirationmanager").await.unwrap());

    lock.release(&takeover).await.unwrap();
    assert!(!lock.is_held("lock:expirationmanager").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_lock_within_staleness_is_not_reclaimed() {
    let h = Harness::new();
    let lock = h.lock();
    let cancel = CancellationToken::new();

    lock.acquire("queue:default", Duration::ZERO, &cancel)
        .await
        .unwrap();
    h.clock.advance(STALENESS - Duration::from_secs(1));

    let err = lock
        .acquire("queue:default", Duration::ZERO, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_acquire_observes_cancellation() {
    let h = Harness::new();
    let lock = h.lock();
    let cancel = CancellationToken::new();
    lock.acquire("lock:busy", Duration::ZERO, &cancel)
        .await
        .unwrap();

    let waiter = {
        let lock = lock.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            lock.acquire("lock:busy", Duration::from_secs(60), &cancel)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(350)).await;
    let cancelled_at = Instant::now();
    cancel.cancel();
    let err = waiter.await.unwrap().unwrap_err();

    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert!(cancelled_at.elapsed() <= common::POLL);
}

#[tokio::test]
async fn test_empty_resource_is_rejected() {
    let h = Harness::new();
    let err = h
        .lock()
        .acquire("", Duration::ZERO, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test(start_paused = true)]
async fn test_configured_lock_uses_acquire_timeout() {
    let h = Harness::new();
    let config = LockConfig {
        acquire_timeout_seconds: 3,
        ..LockConfig::default()
    };
    let lock = DistributedLock::from_config(h.storage.locks.clone(), h.clock(), &config).unwrap();
    let cancel = CancellationToken::new();

    lock.acquire_default("lock:configured", &cancel).await.unwrap();
    let started = Instant::now();
    let err = lock
        .acquire_default("lock:configured", &cancel)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Timeout);
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_millis(3200));
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_timeout_waits_for_release() {
    let h = Harness::new();
    let lock = h.lock();
    let cancel = CancellationToken::new();
    let held = lock
        .acquire("lock:forever", Duration::MAX, &cancel)
        .await
        .unwrap();

    let waiter = {
        let lock = lock.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { lock.acquire("lock:forever", Duration::MAX, &cancel).await })
    };

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!waiter.is_finished());
    lock.release(&held).await.unwrap();

    let lease = waiter.await.unwrap().unwrap();
    assert!(!lease.reclaimed);
}

#[test]
fn test_staleness_beyond_timestamp_range_is_rejected() {
    let h = Harness::new();
    let err = DistributedLock::new(
        h.storage.locks.clone(),
        h.clock(),
        Duration::MAX,
        std::sync::Arc::new(rowqueue_worker::FixedInterval::new(common::POLL, Duration::ZERO)),
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Configuration);
}
