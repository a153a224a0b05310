//! Record types shared by every storage backend.

pub mod collection;
pub mod counter;
pub mod expiring;
pub mod id;
pub mod job;
pub mod lock;
pub mod queue;
pub mod server;
pub mod state;

pub use collection::{HashEntry, ListEntry, SetEntry};
pub use counter::AggregatedCounter;
pub use expiring::ExpiringTable;
pub use id::*;
pub use job::{Job, JobParameter, NewJob};
pub use lock::LockLease;
pub use queue::{ClaimedJob, QueueCounts, QueueEntry};
pub use server::ServerRecord;
pub use state::{JobState, NewState};
