//! Counter records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running total for a key, produced by folding raw counter rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AggregatedCounter {
    /// Counter key.
    pub key: String,
    /// Folded total.
    pub value: i64,
    /// Greatest expiry among folded rows.
    pub expire_at: Option<DateTime<Utc>>,
}
