//! Storage seam for auxiliary hashes, sets, and lists.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::result::AppResult;
use crate::types::{ExpiringTable, HashEntry, ListEntry, SetEntry};

/// Plain CRUD over the keyed auxiliary tables.
#[async_trait]
pub trait CollectionStore: Send + Sync + std::fmt::Debug + 'static {
    /// Upsert fields of a hash.
    async fn set_hash(&self, key: &str, fields: &[(String, String)]) -> AppResult<()>;

    /// All fields of a hash, ordered by field.
    async fn hash(&self, key: &str) -> AppResult<Vec<HashEntry>>;

    /// Delete a hash. Returns the number of fields removed.
    async fn remove_hash(&self, key: &str) -> AppResult<u64>;

    /// Add a member to a set, updating its score if present.
    async fn add_to_set(&self, key: &str, value: &str, score: f64) -> AppResult<()>;

    /// Remove a member from a set.
    async fn remove_from_set(&self, key: &str, value: &str) -> AppResult<bool>;

    /// Members of a set ordered by score then value.
    async fn set_members(&self, key: &str) -> AppResult<Vec<SetEntry>>;

    /// Prepend a value to a list.
    async fn push_list(&self, key: &str, value: &str) -> AppResult<()>;

    /// Elements `start..=end` of a list, newest first.
    async fn list_range(&self, key: &str, start: u32, end: u32) -> AppResult<Vec<ListEntry>>;

    /// Keep only elements `start..=end` (newest first). Returns rows removed.
    async fn trim_list(&self, key: &str, start: u32, end: u32) -> AppResult<u64>;

    /// Set or clear the expiry of every row of `key` in a hash, set, list,
    /// or aggregated counter table.
    async fn expire_key(
        &self,
        table: ExpiringTable,
        key: &str,
        expire_at: Option<DateTime<Utc>>,
    ) -> AppResult<u64>;
}
