//! Queue fetcher scenarios.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use rowqueue_core::config::QueueConfig;
use rowqueue_core::error::ErrorKind;
use rowqueue_core::types::JobId;
use rowqueue_worker::QueueFetcher;

use common::{queues, Harness, INVISIBILITY, POLL};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_fetchers_claim_each_entry_once() {
    let h = Harness::new();
    for id in 1..=5 {
        h.storage.queue.push("default", JobId(id)).await.unwrap();
    }

    let fetcher = Arc::new(h.fetcher());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let fetcher = fetcher.clone();
        handles.push(tokio::spawn(async move {
            fetcher
                .dequeue(&queues(&["default"]), Duration::ZERO, &CancellationToken::new())
                .await
        }));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(job) => claimed.push(job),
            Err(e) => assert_eq!(e.kind, ErrorKind::Timeout),
        }
    }

    assert_eq!(claimed.len(), 5);
    let entries: HashSet<_> = claimed.iter().map(|c| c.entry_id).collect();
    let tokens: HashSet<_> = claimed.iter().map(|c| c.fetch_token.clone()).collect();
    assert_eq!(entries.len(), 5);
    assert_eq!(tokens.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_zero_timeout_on_empty_queue_is_immediate_timeout() {
    let h = Harness::new();
    let started = Instant::now();
    let err = h
        .fetcher()
        .dequeue(&queues(&["default"]), Duration::ZERO, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_poll_returns_cancelled_within_one_interval() {
    let h = Harness::new();
    let fetcher = Arc::new(h.fetcher());
    let cancel = CancellationToken::new();

    let waiter = {
        let fetcher = fetcher.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            fetcher
                .dequeue(&queues(&["default"]), Duration::from_secs(60), &cancel)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(250)).await;
    let cancelled_at = Instant::now();
    cancel.cancel();
    let err = waiter.await.unwrap().unwrap_err();

    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert!(cancelled_at.elapsed() <= POLL);
}

#[tokio::test(start_paused = true)]
async fn test_dequeue_waits_for_work() {
    let h = Harness::new();
    let fetcher = Arc::new(h.fetcher());
    let queue = h.storage.queue.clone();

    let waiter = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move {
            fetcher
                .dequeue(&queues(&["default"]), Duration::from_secs(5), &CancellationToken::new())
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(450)).await;
    let entry = queue.push("default", JobId(7)).await.unwrap();

    let claimed = waiter.await.unwrap().unwrap();
    assert_eq!(claimed.entry_id, entry);
    assert_eq!(claimed.job_id, JobId(7));
}

#[tokio::test]
async fn test_queues_are_scanned_in_caller_order() {
    let h = Harness::new();
    h.storage.queue.push("default", JobId(1)).await.unwrap();
    h.storage.queue.push("critical", JobId(2)).await.unwrap();

    let claimed = h
        .fetcher()
        .dequeue(
            &queues(&["critical", "default"]),
            Duration::ZERO,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(claimed.queue, "critical");
    assert_eq!(claimed.job_id, JobId(2));
}

#[tokio::test]
async fn test_expired_claim_is_redelivered_and_stale_ack_is_rejected() {
    let h = Harness::new();
    let fetcher = h.fetcher();
    let cancel = CancellationToken::new();
    h.storage.queue.push("default", JobId(1)).await.unwrap();

    let first = fetcher
        .dequeue(&queues(&["default"]), Duration::ZERO, &cancel)
        .await
        .unwrap();
    let err = fetcher
        .dequeue(&queues(&["default"]), Duration::ZERO, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);

    h.clock.advance(INVISIBILITY + Duration::from_secs(1));
    let second = fetcher
        .dequeue(&queues(&["default"]), Duration::ZERO, &cancel)
        .await
        .unwrap();
    assert_eq!(second.entry_id, first.entry_id);
    assert_ne!(second.fetch_token, first.fetch_token);

    assert!(!fetcher.acknowledge(&first).await.unwrap());
    assert!(fetcher.acknowledge(&second).await.unwrap());
    let counts = fetcher.counts("default").await.unwrap();
    assert_eq!((counts.enqueued, counts.fetched), (0, 0));
}

#[tokio::test]
async fn test_requeue_makes_entry_available_again() {
    let h = Harness::new();
    let fetcher = h.fetcher();
    let cancel = CancellationToken::new();
    h.storage.queue.push("default", JobId(1)).await.unwrap();

    let claimed = fetcher
        .dequeue(&queues(&["default"]), Duration::ZERO, &cancel)
        .await
        .unwrap();
    assert_eq!(fetcher.counts("default").await.unwrap().fetched, 1);

    assert!(fetcher.requeue(&claimed).await.unwrap());
    assert!(!fetcher.requeue(&claimed).await.unwrap());
    assert_eq!(fetcher.counts("default").await.unwrap().enqueued, 1);
    assert_eq!(fetcher.queues().await.unwrap(), vec!["default".to_string()]);

    fetcher
        .dequeue(&queues(&["default"]), Duration::ZERO, &cancel)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_claim_lock_busy_means_no_work_this_attempt() {
    let h = Harness::new();
    let lock = h.lock();
    let cancel = CancellationToken::new();
    let fetcher = h.fetcher().with_claim_lock(lock.clone(), Duration::ZERO);
    h.storage.queue.push("default", JobId(1)).await.unwrap();

    let lease = lock
        .acquire("queue:default", Duration::ZERO, &cancel)
        .await
        .unwrap();
    let err = fetcher
        .dequeue(&queues(&["default"]), Duration::ZERO, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);

    lock.release(&lease).await.unwrap();
    fetcher
        .dequeue(&queues(&["default"]), Duration::ZERO, &cancel)
        .await
        .unwrap();
    assert!(!lock.is_held("queue:default").await.unwrap());
}

#[tokio::test]
async fn test_orphaned_entry_yields_no_job() {
    let h = Harness::new();
    let fetcher = h.fetcher();
    h.storage.queue.push("default", JobId(404)).await.unwrap();

    let claimed = fetcher
        .dequeue(&queues(&["default"]), Duration::ZERO, &CancellationToken::new())
        .await
        .unwrap();
    assert!(fetcher.job(&claimed).await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_queue_list_is_rejected() {
    let h = Harness::new();
    let err = h
        .fetcher()
        .dequeue(&[], Duration::ZERO, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_configured_fetcher_serializes_claims_through_lock() {
    let h = Harness::new();
    let config = QueueConfig {
        use_claim_lock: true,
        claim_lock_timeout_ms: 0,
        ..QueueConfig::default()
    };
    let lock = h.lock();
    let fetcher = QueueFetcher::from_config(
        h.storage.queue.clone(),
        h.storage.jobs.clone(),
        h.clock(),
        lock.clone(),
        &config,
    )
    .unwrap();
    h.storage.queue.push("default", JobId(1)).await.unwrap();

    let cancel = CancellationToken::new();
    let lease = lock
        .acquire("queue:default", Duration::ZERO, &cancel)
        .await
        .unwrap();
    let err = fetcher
        .dequeue(&queues(&["default"]), Duration::ZERO, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    lock.release(&lease).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_timeout_claims_available_work() {
    let h = Harness::new();
    h.storage.queue.push("default", JobId(1)).await.unwrap();

    let claimed = h
        .fetcher()
        .dequeue(&queues(&["default"]), Duration::MAX, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(claimed.job_id, JobId(1));
}
