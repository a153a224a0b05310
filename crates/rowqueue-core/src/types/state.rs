//! Job state names and state history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{JobId, StateId};

/// Job was placed on a queue and waits for a worker.
pub const ENQUEUED: &str = "Enqueued";
/// Job is waiting for a point in time.
pub const SCHEDULED: &str = "Scheduled";
/// Job is waiting for a parent job.
pub const AWAITING: &str = "Awaiting";
/// A worker claimed the job and is running it.
pub const PROCESSING: &str = "Processing";
/// Job ran to completion.
pub const SUCCEEDED: &str = "Succeeded";
/// Job threw; may be retried by re-enqueueing.
pub const FAILED: &str = "Failed";
/// Job was removed by an operator.
pub const DELETED: &str = "Deleted";

/// One immutable row of a job's state history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct JobState {
    /// Row identifier; ascending ids give append order.
    pub id: StateId,
    /// Owning job.
    pub job_id: JobId,
    /// State name, e.g. [`SUCCEEDED`].
    pub name: String,
    /// Why the transition happened.
    pub reason: Option<String>,
    /// When the transition was recorded.
    pub created_at: DateTime<Utc>,
    /// Opaque serialized state data.
    pub data: Option<String>,
}

/// A transition to append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewState {
    /// State name.
    pub name: String,
    /// Why the transition happened.
    pub reason: Option<String>,
    /// Opaque serialized state data.
    pub data: Option<String>,
}

impl NewState {
    /// A transition with no reason or data.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: None,
            data: None,
        }
    }

    /// Attach a reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attach opaque state data.
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }
}
