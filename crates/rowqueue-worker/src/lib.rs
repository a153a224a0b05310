//! Job processing on top of the rowqueue storage traits.
//!
//! This crate provides:
//! - An advisory distributed lock with stale-lease reclaim
//! - A queue fetcher that claims entries with fetch tokens
//! - A job state machine that manages retention of finished jobs
//! - An expiration sweeper that folds counters and deletes expired rows
//! - A producer client, a worker runner, and server heartbeats

pub mod client;
pub mod executor;
pub mod fetcher;
pub mod heartbeat;
pub mod lock;
pub mod polling;
pub mod runner;
pub mod state;
pub mod sweeper;

pub use client::{BackgroundJobClient, Invocation};
pub use executor::{JobContext, JobExecutionError, JobExecutor, JobHandler};
pub use fetcher::QueueFetcher;
pub use heartbeat::ServerHeartbeat;
pub use lock::DistributedLock;
pub use polling::{ExponentialBackoff, FixedInterval, PollPolicy};
pub use runner::WorkerRunner;
pub use state::StateMachine;
pub use sweeper::{ExpirationSweeper, SweepReport};
