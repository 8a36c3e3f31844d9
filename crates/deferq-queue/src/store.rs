//! Entry persistence store.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::entry::{NewEntry, QueueEntry};
use crate::error::QueueError;

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

/// Entry store trait for persistence.
///
/// Every method is a single store round trip. Implementations do not need
/// cross-call transactions.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Insert entries, returning them with their assigned ids.
    async fn insert(&self, entries: Vec<NewEntry>) -> Result<Vec<QueueEntry>, QueueError>;

    /// Load an entry by id.
    async fn load(&self, id: i64) -> Result<Option<QueueEntry>, QueueError>;

    /// Delete pending entries of `kind` whose target id is in `ids`.
    ///
    /// Executed entries are never touched. Returns the number of deleted rows.
    async fn delete_pending(&self, kind: &str, ids: &[i64]) -> Result<usize, QueueError>;

    /// Pending entries with `due_at <= now`, ordered by `due_at` ascending.
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<QueueEntry>, QueueError>;

    /// Persist an entry's current state.
    async fn update(&self, entry: &QueueEntry) -> Result<(), QueueError>;

    /// Number of pending entries.
    async fn count_pending(&self) -> Result<usize, QueueError>;

    /// Number of executed entries, optionally only those executed at or before `before`.
    async fn count_executed(&self, before: Option<DateTime<Utc>>) -> Result<usize, QueueError>;

    /// Delete executed entries, optionally only those executed at or before `before`.
    async fn delete_executed(&self, before: Option<DateTime<Utc>>) -> Result<usize, QueueError>;
}

fn executed_matches(entry: &QueueEntry, before: Option<DateTime<Utc>>) -> bool {
    match (entry.executed_at, before) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(executed), Some(cutoff)) => executed <= cutoff,
    }
}

struct MemoryState {
    next_id: i64,
    entries: BTreeMap<i64, QueueEntry>,
}

/// In-memory entry store.
pub struct MemoryEntryStore {
    state: RwLock<MemoryState>,
}

impl MemoryEntryStore {
    /// Create a new memory store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState {
                next_id: 1,
                entries: BTreeMap::new(),
            }),
        }
    }

    /// Snapshot of all entries ordered by id.
    pub async fn all(&self) -> Vec<QueueEntry> {
        self.state.read().await.entries.values().cloned().collect()
    }
}

impl Default for MemoryEntryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn insert(&self, entries: Vec<NewEntry>) -> Result<Vec<QueueEntry>, QueueError> {
        let mut state = self.state.write().await;
        let mut inserted = Vec::with_capacity(entries.len());

        for new in entries {
            let id = state.next_id;
            state.next_id += 1;
            let entry = new.into_entry(id);
            state.entries.insert(id, entry.clone());
            inserted.push(entry);
        }

        debug!("Inserted {} entries", inserted.len());
        Ok(inserted)
    }

    async fn load(&self, id: i64) -> Result<Option<QueueEntry>, QueueError> {
        Ok(self.state.read().await.entries.get(&id).cloned())
    }

    async fn delete_pending(&self, kind: &str, ids: &[i64]) -> Result<usize, QueueError> {
        let ids: HashSet<i64> = ids.iter().copied().collect();
        let mut state = self.state.write().await;
        let before = state.entries.len();

        state.entries.retain(|_, e| {
            !(e.is_pending() && e.target_kind == kind && ids.contains(&e.target_id))
        });

        Ok(before - state.entries.len())
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<QueueEntry>, QueueError> {
        let state = self.state.read().await;
        let mut due: Vec<QueueEntry> = state
            .entries
            .values()
            .filter(|e| e.is_due(now))
            .cloned()
            .collect();

        // Entries are visited in id order, so ties on due_at stay in insertion order.
        due.sort_by_key(|e| e.due_at);
        Ok(due)
    }

    async fn update(&self, entry: &QueueEntry) -> Result<(), QueueError> {
        let mut state = self.state.write().await;
        match state.entries.get_mut(&entry.id) {
            Some(stored) => {
                *stored = entry.clone();
                Ok(())
            }
            None => Err(QueueError::EntryNotFound(entry.id)),
        }
    }

    async fn count_pending(&self) -> Result<usize, QueueError> {
        let state = self.state.read().await;
        Ok(state.entries.values().filter(|e| e.is_pending()).count())
    }

    async fn count_executed(&self, before: Option<DateTime<Utc>>) -> Result<usize, QueueError> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .values()
            .filter(|e| executed_matches(e, before))
            .count())
    }

    async fn delete_executed(&self, before: Option<DateTime<Utc>>) -> Result<usize, QueueError> {
        let mut state = self.state.write().await;
        let count = state.entries.len();
        state.entries.retain(|_, e| !executed_matches(e, before));
        let deleted = count - state.entries.len();

        debug!("Deleted {} executed entries", deleted);
        Ok(deleted)
    }
}
