//! PostgreSQL repository tests.
//!
//! These run only when `ROWQUEUE_TEST_DATABASE_URL` points at a scratch
//! database; otherwise every test returns early.

use chrono::{Duration, SubsecRound, Utc};

use rowqueue_core::config::DatabaseConfig;
use rowqueue_core::types::{state, ExpiringTable, JobId, NewJob, NewState};
use rowqueue_database::migration::run_migrations;
use rowqueue_database::{DatabasePool, Storage};

async fn storage() -> Option<Storage> {
    let url = std::env::var("ROWQUEUE_TEST_DATABASE_URL").ok()?;
    let config = DatabaseConfig {
        url,
        ..DatabaseConfig::default()
    };
    let pool = DatabasePool::connect(&config).await.expect("connect");
    run_migrations(pool.pool()).await.expect("migrate");
    Some(Storage::postgres(pool))
}

fn unique(prefix: &str) -> String {
    format!("{prefix}:{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

#[tokio::test]
async fn test_lock_insert_conflict_and_release() {
    let Some(storage) = storage().await else {
        return;
    };
    let resource = unique("lock");
    let now = Utc::now().trunc_subsecs(6);

    assert!(storage.locks.try_insert(&resource, now).await.unwrap());
    assert!(!storage.locks.try_insert(&resource, now).await.unwrap());
    assert_eq!(storage.locks.holder(&resource).await.unwrap(), Some(now));
    assert!(storage.locks.remove(&resource, now).await.unwrap());
    assert!(storage.locks.holder(&resource).await.unwrap().is_none());
}

#[tokio::test]
async fn test_stale_lock_is_reclaimed_once() {
    let Some(storage) = storage().await else {
        return;
    };
    let resource = unique("lock");
    let t0 = Utc::now().trunc_subsecs(6) - Duration::minutes(15);
    let t1 = Utc::now().trunc_subsecs(6);

    assert!(storage.locks.try_insert(&resource, t0).await.unwrap());
    let cutoff = t1 - Duration::minutes(10);
    assert!(storage.locks.reclaim_stale(&resource, cutoff, t1).await.unwrap());
    assert!(!storage.locks.reclaim_stale(&resource, cutoff, t1).await.unwrap());

    // The original holder's release must not drop the new lease.
    assert!(!storage.locks.remove(&resource, t0).await.unwrap());
    assert!(storage.locks.remove(&resource, t1).await.unwrap());
}

#[tokio::test]
async fn test_claim_ack_and_requeue() {
    let Some(storage) = storage().await else {
        return;
    };
    let queue = unique("q");
    let now = Utc::now().trunc_subsecs(6);
    let entry = storage.queue.push(&queue, JobId(1)).await.unwrap();

    let claimed = storage
        .queue
        .try_claim(&queue, now - Duration::minutes(30), now, "token-a")
        .await
        .unwrap()
        .expect("entry claimed");
    assert_eq!(claimed.id, entry);
    assert!(
        storage
            .queue
            .try_claim(&queue, now - Duration::minutes(30), now, "token-b")
            .await
            .unwrap()
            .is_none()
    );

    assert!(!storage.queue.acknowledge(entry, "token-b").await.unwrap());
    assert!(storage.queue.requeue(entry, "token-a").await.unwrap());
    let counts = storage.queue.counts(&queue).await.unwrap();
    assert_eq!((counts.enqueued, counts.fetched), (1, 0));
}

#[tokio::test]
async fn test_state_history_and_cascading_expiry() {
    let Some(storage) = storage().await else {
        return;
    };
    let now = Utc::now().trunc_subsecs(6);
    let job = NewJob {
        invocation_data: r#"{"job_type":"noop"}"#.to_string(),
        arguments: "[]".to_string(),
        parameters: vec![("RetryCount".to_string(), "0".to_string())],
        expire_at: None,
    };
    let id = storage.jobs.create(&job, now).await.unwrap();
    storage
        .jobs
        .append_state(id, &NewState::new(state::ENQUEUED), None, now)
        .await
        .unwrap();
    storage
        .jobs
        .append_state(
            id,
            &NewState::new(state::SUCCEEDED),
            Some(now - Duration::seconds(1)),
            now,
        )
        .await
        .unwrap();

    let history = storage.jobs.state_history(id).await.unwrap();
    let names: Vec<_> = history.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec![state::ENQUEUED, state::SUCCEEDED]);

    loop {
        let deleted = storage
            .expiration
            .delete_expired(ExpiringTable::Job, now, 100)
            .await
            .unwrap();
        if deleted < 100 {
            break;
        }
    }
    assert!(storage.jobs.find(id).await.unwrap().is_none());
    assert!(storage.jobs.parameters(id).await.unwrap().is_empty());
    assert!(storage.jobs.state_history(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fold_preserves_logical_value() {
    let Some(storage) = storage().await else {
        return;
    };
    let key = unique("stats:succeeded");
    for delta in [1, 1, -1, 1] {
        storage.counters.increment(&key, delta, None).await.unwrap();
    }
    let before = storage.counters.value(&key).await.unwrap();

    while storage.counters.fold(1000).await.unwrap() == 1000 {}

    assert_eq!(storage.counters.value(&key).await.unwrap(), before);
    assert_eq!(storage.counters.raw_count(&key).await.unwrap(), 0);
    let folded = storage.counters.aggregated(&key).await.unwrap().expect("row");
    assert_eq!(folded.value, 2);
}

#[tokio::test]
async fn test_provisional_expiry_and_long_state_text() {
    let Some(storage) = storage().await else {
        return;
    };
    let now = Utc::now().trunc_subsecs(6);
    let provisional = now + Duration::days(30);
    let job = NewJob {
        invocation_data: r#"{"job_type":"noop"}"#.to_string(),
        arguments: "[]".to_string(),
        parameters: Vec::new(),
        expire_at: Some(provisional),
    };
    let id = storage.jobs.create(&job, now).await.unwrap();
    assert_eq!(storage.jobs.find(id).await.unwrap().unwrap().expire_at, Some(provisional));

    let enqueued = storage
        .jobs
        .append_state(
            id,
            &NewState::new(state::ENQUEUED).with_reason("r".repeat(500)),
            Some(provisional),
            now,
        )
        .await
        .unwrap();
    assert!(storage.jobs.persist(id, enqueued).await.unwrap());
    assert_eq!(storage.jobs.find(id).await.unwrap().unwrap().expire_at, None);

    storage
        .jobs
        .append_state(id, &NewState::new("AwaitingContinuationOfParent"), None, now)
        .await
        .unwrap();
    assert!(!storage.jobs.persist(id, enqueued).await.unwrap());
    assert_eq!(
        storage.jobs.find(id).await.unwrap().unwrap().state_name.as_deref(),
        Some("AwaitingContinuationOfParent")
    );
}
