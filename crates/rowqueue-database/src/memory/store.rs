//! Table state and trait implementations for [`MemoryStorage`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use rowqueue_core::error::AppError;
use rowqueue_core::result::AppResult;
use rowqueue_core::traits::{
    CollectionStore, CounterStore, ExpirationStore, JobStore, LockStore, QueueStore, ServerStore,
};
use rowqueue_core::types::{
    AggregatedCounter, ExpiringTable, HashEntry, Job, JobId, JobParameter, JobState, ListEntry,
    NewJob, NewState, QueueCounts, QueueEntry, QueueEntryId, ServerRecord, SetEntry, StateId,
};

#[derive(Debug, Clone)]
struct RawCounter {
    key: String,
    value: i64,
    expire_at: Option<DateTime<Utc>>,
}

/// Rows of every table, keyed the way the SQL schema constrains them.
#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    jobs: BTreeMap<i64, Job>,
    parameters: BTreeMap<(i64, String), Option<String>>,
    states: BTreeMap<i64, JobState>,
    queue: BTreeMap<i64, QueueEntry>,
    locks: HashMap<String, DateTime<Utc>>,
    counters: BTreeMap<i64, RawCounter>,
    aggregated: BTreeMap<String, (i64, AggregatedCounter)>,
    hashes: BTreeMap<(String, String), (i64, HashEntry)>,
    sets: BTreeMap<(String, String), (i64, SetEntry)>,
    lists: BTreeMap<i64, ListEntry>,
    servers: BTreeMap<String, ServerRecord>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn delete_job(&mut self, id: i64) {
        self.jobs.remove(&id);
        self.parameters.retain(|(job_id, _), _| *job_id != id);
        self.states.retain(|_, state| state.job_id.get() != id);
    }

    /// Ids of up to `limit` rows of `table` expiring at or before `now`,
    /// lowest id first.
    fn expired_ids(&self, table: ExpiringTable, now: DateTime<Utc>, limit: usize) -> Vec<i64> {
        let expired = |expire_at: Option<DateTime<Utc>>| expire_at.is_some_and(|at| at <= now);
        let mut ids: Vec<i64> = match table {
            ExpiringTable::Job => self
                .jobs
                .values()
                .filter(|j| expired(j.expire_at))
                .map(|j| j.id.get())
                .collect(),
            ExpiringTable::List => self
                .lists
                .values()
                .filter(|l| expired(l.expire_at))
                .map(|l| l.id)
                .collect(),
            ExpiringTable::Set => self
                .sets
                .values()
                .filter(|(_, s)| expired(s.expire_at))
                .map(|(id, _)| *id)
                .collect(),
            ExpiringTable::Hash => self
                .hashes
                .values()
                .filter(|(_, h)| expired(h.expire_at))
                .map(|(id, _)| *id)
                .collect(),
            ExpiringTable::AggregatedCounter => self
                .aggregated
                .values()
                .filter(|(_, c)| expired(c.expire_at))
                .map(|(id, _)| *id)
                .collect(),
        };
        ids.sort_unstable();
        ids.truncate(limit);
        ids
    }
}

/// `GREATEST` as PostgreSQL evaluates it: nulls are ignored.
fn greatest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Storage backend holding every table in process memory.
///
/// Cloning shares the underlying tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryStorage {
    async fn create(&self, job: &NewJob, now: DateTime<Utc>) -> AppResult<JobId> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        tables.jobs.insert(
            id,
            Job {
                id: JobId(id),
                state_id: None,
                state_name: None,
                invocation_data: job.invocation_data.clone(),
                arguments: job.arguments.clone(),
                created_at: now,
                expire_at: job.expire_at,
            },
        );
        for (name, value) in &job.parameters {
            tables
                .parameters
                .insert((id, name.clone()), Some(value.clone()));
        }
        Ok(JobId(id))
    }

    async fn find(&self, id: JobId) -> AppResult<Option<Job>> {
        Ok(self.tables.lock().await.jobs.get(&id.get()).cloned())
    }

    async fn set_parameter(&self, id: JobId, name: &str, value: Option<&str>) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.jobs.contains_key(&id.get()) {
            return Err(AppError::not_found(format!("Job {id} not found")));
        }
        tables
            .parameters
            .insert((id.get(), name.to_string()), value.map(str::to_string));
        Ok(())
    }

    async fn parameter(&self, id: JobId, name: &str) -> AppResult<Option<String>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .parameters
            .get(&(id.get(), name.to_string()))
            .cloned()
            .flatten())
    }

    async fn parameters(&self, id: JobId) -> AppResult<Vec<JobParameter>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .parameters
            .iter()
            .filter(|((job_id, _), _)| *job_id == id.get())
            .map(|((_, name), value)| JobParameter {
                job_id: id,
                name: name.clone(),
                value: value.clone(),
            })
            .collect())
    }

    async fn append_state(
        &self,
        id: JobId,
        state: &NewState,
        expire_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> AppResult<StateId> {
        let mut tables = self.tables.lock().await;
        if !tables.jobs.contains_key(&id.get()) {
            return Err(AppError::not_found(format!("Job {id} not found")));
        }

        let state_id = StateId(tables.next_id());
        tables.states.insert(
            state_id.get(),
            JobState {
                id: state_id,
                job_id: id,
                name: state.name.clone(),
                reason: state.reason.clone(),
                created_at: now,
                data: state.data.clone(),
            },
        );
        if let Some(job) = tables.jobs.get_mut(&id.get()) {
            job.state_id = Some(state_id);
            job.state_name = Some(state.name.clone());
            job.expire_at = expire_at;
        }
        Ok(state_id)
    }

    async fn persist(&self, id: JobId, state_id: StateId) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.jobs.get_mut(&id.get()) {
            Some(job) if job.state_id == Some(state_id) => {
                job.expire_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn state_history(&self, id: JobId) -> AppResult<Vec<JobState>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .states
            .values()
            .filter(|s| s.job_id == id)
            .cloned()
            .collect())
    }

    async fn count_by_state(&self, state_name: &str) -> AppResult<i64> {
        let tables = self.tables.lock().await;
        let count = tables
            .jobs
            .values()
            .filter(|j| j.state_name.as_deref() == Some(state_name))
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

#[async_trait]
impl QueueStore for MemoryStorage {
    async fn push(&self, queue: &str, job_id: JobId) -> AppResult<QueueEntryId> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        tables.queue.insert(
            id,
            QueueEntry {
                id: QueueEntryId(id),
                job_id,
                queue: queue.to_string(),
                fetched_at: None,
                fetch_token: None,
            },
        );
        Ok(QueueEntryId(id))
    }

    async fn try_claim(
        &self,
        queue: &str,
        invisible_before: DateTime<Utc>,
        now: DateTime<Utc>,
        fetch_token: &str,
    ) -> AppResult<Option<QueueEntry>> {
        let mut tables = self.tables.lock().await;
        let entry = tables
            .queue
            .values_mut()
            .find(|e| e.queue == queue && e.is_claimable(invisible_before));

        Ok(entry.map(|entry| {
            entry.fetched_at = Some(now);
            entry.fetch_token = Some(fetch_token.to_string());
            entry.clone()
        }))
    }

    async fn acknowledge(&self, entry_id: QueueEntryId, fetch_token: &str) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        let owned = tables
            .queue
            .get(&entry_id.get())
            .is_some_and(|e| e.fetch_token.as_deref() == Some(fetch_token));
        if owned {
            tables.queue.remove(&entry_id.get());
        }
        Ok(owned)
    }

    async fn requeue(&self, entry_id: QueueEntryId, fetch_token: &str) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.queue.get_mut(&entry_id.get()) {
            Some(entry) if entry.fetch_token.as_deref() == Some(fetch_token) => {
                entry.fetched_at = None;
                entry.fetch_token = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn queues(&self) -> AppResult<Vec<String>> {
        let tables = self.tables.lock().await;
        let mut names: Vec<String> = tables.queue.values().map(|e| e.queue.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn counts(&self, queue: &str) -> AppResult<QueueCounts> {
        let tables = self.tables.lock().await;
        let (mut enqueued, mut fetched) = (0, 0);
        for entry in tables.queue.values().filter(|e| e.queue == queue) {
            if entry.fetched_at.is_some() {
                fetched += 1;
            } else {
                enqueued += 1;
            }
        }
        Ok(QueueCounts {
            queue: queue.to_string(),
            enqueued,
            fetched,
        })
    }
}

#[async_trait]
impl LockStore for MemoryStorage {
    async fn try_insert(&self, resource: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.locks.contains_key(resource) {
            return Ok(false);
        }
        tables.locks.insert(resource.to_string(), now);
        Ok(true)
    }

    async fn reclaim_stale(
        &self,
        resource: &str,
        stale_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.locks.get_mut(resource) {
            Some(created_at) if *created_at < stale_before => {
                debug!(resource, held_since = %created_at, "Reclaiming stale lock");
                *created_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove(&self, resource: &str, acquired_at: DateTime<Utc>) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.locks.get(resource) == Some(&acquired_at) {
            tables.locks.remove(resource);
            return Ok(true);
        }
        Ok(false)
    }

    async fn holder(&self, resource: &str) -> AppResult<Option<DateTime<Utc>>> {
        Ok(self.tables.lock().await.locks.get(resource).copied())
    }
}

#[async_trait]
impl CounterStore for MemoryStorage {
    async fn increment(
        &self,
        key: &str,
        delta: i64,
        expire_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        tables.counters.insert(
            id,
            RawCounter {
                key: key.to_string(),
                value: delta,
                expire_at,
            },
        );
        Ok(())
    }

    async fn value(&self, key: &str) -> AppResult<i64> {
        let tables = self.tables.lock().await;
        let folded = tables.aggregated.get(key).map_or(0, |(_, c)| c.value);
        let raw: i64 = tables
            .counters
            .values()
            .filter(|c| c.key == key)
            .map(|c| c.value)
            .sum();
        Ok(folded + raw)
    }

    async fn aggregated(&self, key: &str) -> AppResult<Option<AggregatedCounter>> {
        let tables = self.tables.lock().await;
        Ok(tables.aggregated.get(key).map(|(_, c)| c.clone()))
    }

    async fn raw_count(&self, key: &str) -> AppResult<i64> {
        let tables = self.tables.lock().await;
        let count = tables.counters.values().filter(|c| c.key == key).count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn fold(&self, batch_size: u32) -> AppResult<u64> {
        let mut tables = self.tables.lock().await;
        let batch: Vec<i64> = tables
            .counters
            .keys()
            .take(batch_size as usize)
            .copied()
            .collect();

        let mut sums: BTreeMap<String, (i64, Option<DateTime<Utc>>)> = BTreeMap::new();
        for id in &batch {
            if let Some(raw) = tables.counters.remove(id) {
                let entry = sums.entry(raw.key).or_insert((0, None));
                entry.0 += raw.value;
                entry.1 = greatest(entry.1, raw.expire_at);
            }
        }

        for (key, (sum, expire_at)) in sums {
            if let Some((_, existing)) = tables.aggregated.get_mut(&key) {
                existing.value += sum;
                existing.expire_at = greatest(existing.expire_at, expire_at);
            } else {
                let id = tables.next_id();
                tables.aggregated.insert(
                    key.clone(),
                    (
                        id,
                        AggregatedCounter {
                            key,
                            value: sum,
                            expire_at,
                        },
                    ),
                );
            }
        }

        Ok(batch.len() as u64)
    }
}

#[async_trait]
impl ExpirationStore for MemoryStorage {
    async fn delete_expired(
        &self,
        table: ExpiringTable,
        now: DateTime<Utc>,
        batch_size: u32,
    ) -> AppResult<u64> {
        let mut tables = self.tables.lock().await;
        let ids = tables.expired_ids(table, now, batch_size as usize);
        match table {
            ExpiringTable::Job => {
                for id in &ids {
                    tables.delete_job(*id);
                }
            }
            ExpiringTable::List => {
                for id in &ids {
                    tables.lists.remove(id);
                }
            }
            ExpiringTable::Set => tables.sets.retain(|_, (id, _)| !ids.contains(id)),
            ExpiringTable::Hash => tables.hashes.retain(|_, (id, _)| !ids.contains(id)),
            ExpiringTable::AggregatedCounter => {
                tables.aggregated.retain(|_, (id, _)| !ids.contains(id))
            }
        }
        Ok(ids.len() as u64)
    }
}

#[async_trait]
impl CollectionStore for MemoryStorage {
    async fn set_hash(&self, key: &str, fields: &[(String, String)]) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        for (field, value) in fields {
            let slot = (key.to_string(), field.clone());
            if let Some((_, entry)) = tables.hashes.get_mut(&slot) {
                entry.value = Some(value.clone());
                continue;
            }
            let id = tables.next_id();
            tables.hashes.insert(
                slot,
                (
                    id,
                    HashEntry {
                        key: key.to_string(),
                        field: field.clone(),
                        value: Some(value.clone()),
                        expire_at: None,
                    },
                ),
            );
        }
        Ok(())
    }

    async fn hash(&self, key: &str) -> AppResult<Vec<HashEntry>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .hashes
            .values()
            .filter(|(_, h)| h.key == key)
            .map(|(_, h)| h.clone())
            .collect())
    }

    async fn remove_hash(&self, key: &str) -> AppResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.hashes.len();
        tables.hashes.retain(|(k, _), _| k != key);
        Ok((before - tables.hashes.len()) as u64)
    }

    async fn add_to_set(&self, key: &str, value: &str, score: f64) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        let slot = (key.to_string(), value.to_string());
        if let Some((_, entry)) = tables.sets.get_mut(&slot) {
            entry.score = score;
            return Ok(());
        }
        let id = tables.next_id();
        tables.sets.insert(
            slot,
            (
                id,
                SetEntry {
                    key: key.to_string(),
                    value: value.to_string(),
                    score,
                    expire_at: None,
                },
            ),
        );
        Ok(())
    }

    async fn remove_from_set(&self, key: &str, value: &str) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        Ok(tables
            .sets
            .remove(&(key.to_string(), value.to_string()))
            .is_some())
    }

    async fn set_members(&self, key: &str) -> AppResult<Vec<SetEntry>> {
        let tables = self.tables.lock().await;
        let mut members: Vec<SetEntry> = tables
            .sets
            .values()
            .filter(|(_, s)| s.key == key)
            .map(|(_, s)| s.clone())
            .collect();
        members.sort_by(|a, b| a.score.total_cmp(&b.score).then_with(|| a.value.cmp(&b.value)));
        Ok(members)
    }

    async fn push_list(&self, key: &str, value: &str) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        tables.lists.insert(
            id,
            ListEntry {
                id,
                key: key.to_string(),
                value: Some(value.to_string()),
                expire_at: None,
            },
        );
        Ok(())
    }

    async fn list_range(&self, key: &str, start: u32, end: u32) -> AppResult<Vec<ListEntry>> {
        if end < start {
            return Ok(Vec::new());
        }
        let tables = self.tables.lock().await;
        Ok(tables
            .lists
            .values()
            .rev()
            .filter(|l| l.key == key)
            .skip(start as usize)
            .take((end - start) as usize + 1)
            .cloned()
            .collect())
    }

    async fn trim_list(&self, key: &str, start: u32, end: u32) -> AppResult<u64> {
        let mut tables = self.tables.lock().await;
        let keep: Vec<i64> = if end < start {
            Vec::new()
        } else {
            tables
                .lists
                .values()
                .rev()
                .filter(|l| l.key == key)
                .skip(start as usize)
                .take((end - start) as usize + 1)
                .map(|l| l.id)
                .collect()
        };
        let before = tables.lists.len();
        tables
            .lists
            .retain(|id, l| l.key != key || keep.contains(id));
        Ok((before - tables.lists.len()) as u64)
    }

    async fn expire_key(
        &self,
        table: ExpiringTable,
        key: &str,
        expire_at: Option<DateTime<Utc>>,
    ) -> AppResult<u64> {
        let mut tables = self.tables.lock().await;
        let mut touched = 0u64;
        match table {
            ExpiringTable::Job => {
                return Err(AppError::validation(
                    "Job expiry is managed by state transitions",
                ));
            }
            ExpiringTable::List => {
                for entry in tables.lists.values_mut().filter(|l| l.key == key) {
                    entry.expire_at = expire_at;
                    touched += 1;
                }
            }
            ExpiringTable::Set => {
                for (_, entry) in tables.sets.values_mut().filter(|(_, s)| s.key == key) {
                    entry.expire_at = expire_at;
                    touched += 1;
                }
            }
            ExpiringTable::Hash => {
                for (_, entry) in tables.hashes.values_mut().filter(|(_, h)| h.key == key) {
                    entry.expire_at = expire_at;
                    touched += 1;
                }
            }
            ExpiringTable::AggregatedCounter => {
                if let Some((_, entry)) = tables.aggregated.get_mut(key) {
                    entry.expire_at = expire_at;
                    touched += 1;
                }
            }
        }
        Ok(touched)
    }
}

#[async_trait]
impl ServerStore for MemoryStorage {
    async fn announce(&self, id: &str, data: &str, now: DateTime<Utc>) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        tables.servers.insert(
            id.to_string(),
            ServerRecord {
                id: id.to_string(),
                data: data.to_string(),
                last_heartbeat: Some(now),
            },
        );
        Ok(())
    }

    async fn heartbeat(&self, id: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.servers.get_mut(id) {
            Some(server) => {
                server.last_heartbeat = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, id: &str) -> AppResult<bool> {
        Ok(self.tables.lock().await.servers.remove(id).is_some())
    }

    async fn remove_timed_out(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let mut tables = self.tables.lock().await;
        let count = tables.servers.len();
        tables
            .servers
            .retain(|_, s| !s.last_heartbeat.is_some_and(|at| at < before));
        Ok((count - tables.servers.len()) as u64)
    }

    async fn servers(&self) -> AppResult<Vec<ServerRecord>> {
        Ok(self.tables.lock().await.servers.values().cloned().collect())
    }
}
