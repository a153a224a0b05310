//! Job and job parameter records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{JobId, StateId};

/// One unit of deferred work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Job {
    /// Row identifier.
    pub id: JobId,
    /// Latest `job_state` row, mirrored for O(1) lookup.
    pub state_id: Option<StateId>,
    /// Name of the latest state.
    pub state_name: Option<String>,
    /// Opaque serialized invocation descriptor.
    pub invocation_data: String,
    /// Opaque serialized arguments.
    pub arguments: String,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// Set once the job reaches a terminal state; `None` is never swept.
    pub expire_at: Option<DateTime<Utc>>,
}

/// Data required to create a new job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    /// Opaque serialized invocation descriptor.
    pub invocation_data: String,
    /// Opaque serialized arguments.
    pub arguments: String,
    /// Parameters stored alongside the job.
    pub parameters: Vec<(String, String)>,
    /// Provisional expiry, so a job whose enqueue never completes is swept.
    pub expire_at: Option<DateTime<Utc>>,
}

/// A named value attached to a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct JobParameter {
    /// Owning job.
    pub job_id: JobId,
    /// Parameter name, unique per job.
    pub name: String,
    /// Parameter value.
    pub value: Option<String>,
}
