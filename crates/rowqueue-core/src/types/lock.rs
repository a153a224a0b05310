//! Distributed lock lease.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A time-bounded grant over a named resource.
///
/// The pair (`resource`, `acquired_at`) identifies the row this lease
/// inserted; releasing only deletes that row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockLease {
    /// Resource name, e.g. `queue:default`.
    pub resource: String,
    /// `created_at` of the lock row.
    pub acquired_at: DateTime<Utc>,
    /// Whether the lease was obtained by reclaiming a stale holder.
    pub reclaimed: bool,
}
