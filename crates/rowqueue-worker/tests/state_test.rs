//! Job state machine and producer client scenarios.

mod common;

use std::time::Duration;

use serde_json::json;

use rowqueue_core::config::JobConfig;
use rowqueue_core::error::ErrorKind;
use rowqueue_core::types::{state, JobId, NewState};
use rowqueue_worker::{Invocation, StateMachine};

use common::{Harness, RETENTION};

#[tokio::test]
async fn test_history_is_ordered_and_terminal_state_sets_expiry() {
    let h = Harness::new();
    let states = h.states();
    let job_id = h
        .client()
        .create(&Invocation::new("send_email"), &json!(["a@b.c"]), &[], "default")
        .await
        .unwrap();

    states
        .append_state(job_id, NewState::new(state::PROCESSING))
        .await
        .unwrap();
    let job = h.storage.jobs.find(job_id).await.unwrap().unwrap();
    assert!(job.expire_at.is_none());

    h.clock.advance(Duration::from_secs(5));
    states
        .append_state(job_id, NewState::new(state::SUCCEEDED))
        .await
        .unwrap();

    let history = states.state_history(job_id).await.unwrap();
    let names: Vec<_> = history.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec![state::ENQUEUED, state::PROCESSING, state::SUCCEEDED]);
    assert!(history.windows(2).all(|w| w[0].id < w[1].id));

    assert_eq!(
        states.current_state(job_id).await.unwrap().as_deref(),
        Some(state::SUCCEEDED)
    );
    let job = h.storage.jobs.find(job_id).await.unwrap().unwrap();
    let expected = history[2].created_at + chrono::Duration::from_std(RETENTION).unwrap();
    assert_eq!(job.expire_at, Some(expected));
    assert_eq!(job.state_id, Some(history[2].id));
}

#[tokio::test]
async fn test_non_terminal_transition_clears_expiry() {
    let h = Harness::new();
    let states = h.states();
    let job_id = h
        .client()
        .create(&Invocation::new("noop"), &json!([]), &[], "default")
        .await
        .unwrap();

    states
        .append_state(job_id, NewState::new(state::DELETED).with_reason("Operator"))
        .await
        .unwrap();
    assert!(h.storage.jobs.find(job_id).await.unwrap().unwrap().expire_at.is_some());

    states
        .append_state(job_id, NewState::new(state::ENQUEUED).with_reason("Requeued"))
        .await
        .unwrap();
    assert!(h.storage.jobs.find(job_id).await.unwrap().unwrap().expire_at.is_none());
    assert_eq!(h.storage.jobs.count_by_state(state::ENQUEUED).await.unwrap(), 1);
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let h = Harness::new();
    let states = h.states();

    let err = states
        .append_state(JobId(12345), NewState::new(state::PROCESSING))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(
        states.current_state(JobId(12345)).await.unwrap_err().kind,
        ErrorKind::NotFound
    );
    assert_eq!(
        states.state_history(JobId(12345)).await.unwrap_err().kind,
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn test_client_stores_job_parameters_and_queue_entry() {
    let h = Harness::new();
    let params = vec![("RetryCount".to_string(), "0".to_string())];
    let job_id = h
        .client()
        .create(&Invocation::new("resize"), &json!({"w": 64}), &params, "media")
        .await
        .unwrap();

    let job = h.storage.jobs.find(job_id).await.unwrap().unwrap();
    assert_eq!(Invocation::from_job(&job).unwrap(), Invocation::new("resize"));
    assert_eq!(job.state_name.as_deref(), Some(state::ENQUEUED));
    assert!(job.expire_at.is_none());
    assert_eq!(
        h.storage.jobs.parameter(job_id, "RetryCount").await.unwrap().as_deref(),
        Some("0")
    );
    assert_eq!(h.storage.queue.counts("media").await.unwrap().enqueued, 1);
}

#[tokio::test]
async fn test_client_rejects_blank_queue() {
    let h = Harness::new();
    let err = h
        .client()
        .create(&Invocation::new("noop"), &json!([]), &[], "  ")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_terminal_states_come_from_configuration() {
    let h = Harness::new();
    let config = JobConfig {
        expiration_seconds: 60,
        terminal_states: vec![state::FAILED.to_string()],
        ..JobConfig::default()
    };
    let states = StateMachine::from_config(h.storage.jobs.clone(), h.clock(), &config).unwrap();
    assert!(states.is_terminal(state::FAILED));
    assert!(!states.is_terminal(state::SUCCEEDED));

    let job_id = h
        .client()
        .create(&Invocation::new("noop"), &json!([]), &[], "default")
        .await
        .unwrap();
    states
        .append_state(job_id, NewState::new(state::FAILED))
        .await
        .unwrap();

    let job = h.storage.jobs.find(job_id).await.unwrap().unwrap();
    assert_eq!(job.expire_at, Some(job.created_at + chrono::Duration::seconds(60)));
}
