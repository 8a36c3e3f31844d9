//! Queue entry definition and state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to a domain object: a kind tag plus an identifier within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetRef {
    /// Kind tag, resolved by a `TargetResolver`.
    pub kind: String,
    /// Identifier within the kind.
    pub id: i64,
}

impl TargetRef {
    /// Create a new target reference.
    pub fn new(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

/// Anything that can be enqueued.
pub trait AsTarget {
    /// The `(kind, id)` pair identifying this object.
    fn target_ref(&self) -> TargetRef;
}

impl AsTarget for TargetRef {
    fn target_ref(&self) -> TargetRef {
        self.clone()
    }
}

impl<T: AsTarget + ?Sized> AsTarget for &T {
    fn target_ref(&self) -> TargetRef {
        (**self).target_ref()
    }
}

/// Entry state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryState {
    /// Waiting to be executed.
    Pending,
    /// Executed (successfully or not). Terminal.
    Executed,
}

/// An entry that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub target_kind: String,
    pub target_id: i64,
    pub action: String,
    pub tombstoned: bool,
    pub created_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

impl NewEntry {
    /// Create a new entry due immediately.
    pub fn new(target: TargetRef, action: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            target_kind: target.kind,
            target_id: target.id,
            action: action.into(),
            tombstoned: false,
            created_at: now,
            due_at: now,
        }
    }

    /// Set the due time.
    pub fn with_due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = due_at;
        self
    }

    /// Mark the target as gone.
    pub fn with_tombstoned(mut self, tombstoned: bool) -> Self {
        self.tombstoned = tombstoned;
        self
    }

    /// Attach a store-assigned id.
    pub fn into_entry(self, id: i64) -> QueueEntry {
        QueueEntry {
            id,
            target_kind: self.target_kind,
            target_id: self.target_id,
            action: self.action,
            tombstoned: self.tombstoned,
            created_at: self.created_at,
            due_at: self.due_at,
            executed_at: None,
        }
    }
}

/// A stored unit of deferred work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Store-assigned id.
    pub id: i64,
    /// Kind tag of the target.
    pub target_kind: String,
    /// Target id within its kind.
    pub target_id: i64,
    /// Action to invoke on the target.
    pub action: String,
    /// Target is gone; process against a placeholder.
    pub tombstoned: bool,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
    /// Earliest execution time.
    pub due_at: DateTime<Utc>,
    /// Completion time (None = pending).
    pub executed_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    /// Current state.
    pub fn state(&self) -> EntryState {
        match self.executed_at {
            Some(_) => EntryState::Executed,
            None => EntryState::Pending,
        }
    }

    /// Check if the entry is still pending.
    pub fn is_pending(&self) -> bool {
        self.executed_at.is_none()
    }

    /// Check if the entry is pending and due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.due_at <= now
    }

    /// The target this entry points at.
    pub fn target_ref(&self) -> TargetRef {
        TargetRef::new(self.target_kind.clone(), self.target_id)
    }

    /// Stamp the entry as executed.
    ///
    /// The stamp never moves backwards past `created_at`, and an entry is
    /// only ever stamped once.
    pub fn mark_executed(&mut self, now: DateTime<Utc>) {
        if self.executed_at.is_none() {
            self.executed_at = Some(now.max(self.created_at));
        }
    }
}
