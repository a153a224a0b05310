//! Tables swept by expiration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A table with an `expire_at` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiringTable {
    /// `job`; deletes cascade to parameters and states.
    Job,
    /// `list`
    List,
    /// `set`
    Set,
    /// `hash`
    Hash,
    /// `aggregated_counter`
    AggregatedCounter,
}

impl ExpiringTable {
    /// Sweep order.
    pub const ALL: [Self; 5] = [
        Self::AggregatedCounter,
        Self::Job,
        Self::List,
        Self::Set,
        Self::Hash,
    ];

    /// SQL table name.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::List => "list",
            Self::Set => "set",
            Self::Hash => "hash",
            Self::AggregatedCounter => "aggregated_counter",
        }
    }
}

impl fmt::Display for ExpiringTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}
