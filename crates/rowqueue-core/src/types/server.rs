//! Server liveness records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A live worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ServerRecord {
    /// Server identifier.
    pub id: String,
    /// Opaque serialized server description.
    pub data: String,
    /// Last heartbeat time.
    pub last_heartbeat: Option<DateTime<Utc>>,
}
