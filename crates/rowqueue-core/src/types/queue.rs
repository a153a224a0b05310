//! Queue entry records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{JobId, QueueEntryId};
use crate::error::AppError;

/// One (job, queue) placement awaiting a worker.
///
/// `job_id` is a soft link: no foreign key backs it and the job may have
/// been swept while the entry still exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct QueueEntry {
    /// Row identifier.
    pub id: QueueEntryId,
    /// Job this entry refers to.
    pub job_id: JobId,
    /// Queue name.
    pub queue: String,
    /// When the entry was claimed; `None` means available.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Proof of ownership for the current claim.
    pub fetch_token: Option<String>,
}

impl QueueEntry {
    /// Whether the entry can be claimed given the claim-expiry cutoff.
    pub fn is_claimable(&self, invisible_before: DateTime<Utc>) -> bool {
        match self.fetched_at {
            None => true,
            Some(fetched_at) => fetched_at < invisible_before,
        }
    }
}

/// A queue entry owned by the caller until acknowledged or requeued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedJob {
    /// Claimed queue entry.
    pub entry_id: QueueEntryId,
    /// Soft link to the job.
    pub job_id: JobId,
    /// Queue the entry was claimed from.
    pub queue: String,
    /// Token required to acknowledge or requeue.
    pub fetch_token: String,
    /// When the claim was made.
    pub fetched_at: DateTime<Utc>,
}

impl TryFrom<QueueEntry> for ClaimedJob {
    type Error = AppError;

    fn try_from(entry: QueueEntry) -> Result<Self, Self::Error> {
        match (entry.fetch_token, entry.fetched_at) {
            (Some(fetch_token), Some(fetched_at)) => Ok(Self {
                entry_id: entry.id,
                job_id: entry.job_id,
                queue: entry.queue,
                fetch_token,
                fetched_at,
            }),
            _ => Err(AppError::consistency(format!(
                "Queue entry {} returned from a claim without a fetch token",
                entry.id
            ))),
        }
    }
}

/// Per-queue monitoring counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    /// Queue name.
    pub queue: String,
    /// Entries waiting for a worker.
    pub enqueued: i64,
    /// Entries currently claimed.
    pub fetched: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_unclaimed_entry_is_not_a_claimed_job() {
        let entry = QueueEntry {
            id: QueueEntryId(7),
            job_id: JobId(1),
            queue: "default".to_string(),
            fetched_at: None,
            fetch_token: None,
        };
        let err = ClaimedJob::try_from(entry).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Consistency);
    }
}
