use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{TimestampMilliSeconds, serde_as};
use utoipa::ToSchema;
use uuid::Uuid;

/// Why the last delivery attempt of a queue entry failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transport error or timeout; retried automatically.
    Network,
    /// Non-2xx answer from the Ledger; only retried on reconnect or explicit request.
    Rejected,
}

/// Bookkeeping for one event awaiting acknowledgment.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueEntry {
    /// Local id of the queued event.
    pub local_id: Uuid,
    /// Attempts made after the first one.
    pub retry_count: u32,
    /// When the last attempt started.
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    #[serde(default)]
    pub last_attempt_at: Option<SystemTime>,
    /// Outcome of the last failed attempt.
    pub last_failure: Option<FailureKind>,
}

impl SyncQueueEntry {
    fn new(local_id: Uuid) -> Self {
        Self {
            local_id,
            retry_count: 0,
            last_attempt_at: None,
            last_failure: None,
        }
    }

    /// Stamp the start of a delivery attempt.
    pub fn begin_attempt(&mut self, now: SystemTime) {
        if self.last_attempt_at.is_some() {
            self.retry_count = self.retry_count.saturating_add(1);
        }
        self.last_attempt_at = Some(now);
    }
}

/// FIFO of events not yet acknowledged by the Ledger, keyed by local id.
#[derive(Debug, Clone, Default)]
pub struct SyncQueue {
    entries: IndexMap<Uuid, SyncQueueEntry>,
}

impl SyncQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event at the back of the queue.
    pub fn enqueue(&mut self, local_id: Uuid) {
        self.entries
            .entry(local_id)
            .or_insert_with(|| SyncQueueEntry::new(local_id));
    }

    /// Re-insert an entry restored from disk, keeping its counters.
    pub fn restore(&mut self, entry: SyncQueueEntry) {
        self.entries.insert(entry.local_id, entry);
    }

    /// Oldest entry.
    pub fn front(&self) -> Option<&SyncQueueEntry> {
        self.entries.first().map(|(_, entry)| entry)
    }

    /// Mutable access to the oldest entry.
    pub fn front_mut(&mut self) -> Option<&mut SyncQueueEntry> {
        self.entries.first_mut().map(|(_, entry)| entry)
    }

    /// Lookup by local id.
    pub fn get_mut(&mut self, local_id: &Uuid) -> Option<&mut SyncQueueEntry> {
        self.entries.get_mut(local_id)
    }

    /// Remove an entry wherever it sits, preserving the order of the rest.
    pub fn remove(&mut self, local_id: &Uuid) -> Option<SyncQueueEntry> {
        self.entries.shift_remove(local_id)
    }

    /// Whether `local_id` is queued.
    pub fn contains(&self, local_id: &Uuid) -> bool {
        self.entries.contains_key(local_id)
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SyncQueueEntry> {
        self.entries.values()
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
