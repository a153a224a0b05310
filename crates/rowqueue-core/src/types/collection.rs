//! Auxiliary hash, set, and list records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One field of a hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct HashEntry {
    /// Hash key.
    pub key: String,
    /// Field name, unique per key.
    pub field: String,
    /// Field value.
    pub value: Option<String>,
    /// Expiry.
    pub expire_at: Option<DateTime<Utc>>,
}

/// One member of a scored set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SetEntry {
    /// Set key.
    pub key: String,
    /// Member, unique per key.
    pub value: String,
    /// Sort score.
    pub score: f64,
    /// Expiry.
    pub expire_at: Option<DateTime<Utc>>,
}

/// One element of a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ListEntry {
    /// Row identifier; lists are read newest first.
    pub id: i64,
    /// List key.
    pub key: String,
    /// Element value.
    pub value: Option<String>,
    /// Expiry.
    pub expire_at: Option<DateTime<Utc>>,
}
