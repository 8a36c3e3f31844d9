//! Fixtures shared by the unit tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

use crate::clock::ManualClock;
use crate::entry::{NewEntry, QueueEntry};
use crate::error::{ActionError, QueueError};
use crate::resolver::{Target, TargetKind, TargetRegistry};
use crate::store::{EntryStore, MemoryEntryStore};

pub(crate) fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// One recorded action invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub kind: String,
    pub id: i64,
    pub action: String,
    pub placeholder: bool,
}

/// Domain object used by the tests.
///
/// Actions: `ok` succeeds, `fail` returns an error, `panic` panics,
/// `slow` advances the shared clock by the kind's `slow_step`.
struct Recorded {
    kind: String,
    id: i64,
    placeholder: bool,
    calls: Arc<Mutex<Vec<Call>>>,
    clock: Option<Arc<ManualClock>>,
    slow_step: Duration,
}

#[async_trait]
impl Target for Recorded {
    fn target_id(&self) -> i64 {
        self.id
    }

    async fn perform(&self, action: &str) -> Result<(), ActionError> {
        self.calls.lock().push(Call {
            kind: self.kind.clone(),
            id: self.id,
            action: action.to_string(),
            placeholder: self.placeholder,
        });

        match action {
            "ok" => Ok(()),
            "fail" => Err(ActionError::new(format!("{} #{} refused", self.kind, self.id))),
            "panic" => panic!("{} #{} blew up", self.kind, self.id),
            "slow" => {
                if let Some(clock) = &self.clock {
                    clock.advance(self.slow_step);
                }
                Ok(())
            }
            other => Err(ActionError::unknown_action(&self.kind, other)),
        }
    }
}

/// A target kind whose live objects are the ids in `live`.
pub(crate) struct RecordingKind {
    name: String,
    live: Mutex<HashSet<i64>>,
    broken_lookup: bool,
    calls: Arc<Mutex<Vec<Call>>>,
    clock: Option<Arc<ManualClock>>,
    slow_step: Duration,
}

impl RecordingKind {
    pub(crate) fn new(name: &str, live: impl IntoIterator<Item = i64>) -> Self {
        Self {
            name: name.to_string(),
            live: Mutex::new(live.into_iter().collect()),
            broken_lookup: false,
            calls: Arc::new(Mutex::new(Vec::new())),
            clock: None,
            slow_step: Duration::zero(),
        }
    }

    /// Every `load` fails.
    pub(crate) fn with_broken_lookup(mut self) -> Self {
        self.broken_lookup = true;
        self
    }

    /// `slow` actions advance `clock` by `step`.
    pub(crate) fn with_clock(mut self, clock: Arc<ManualClock>, step: Duration) -> Self {
        self.clock = Some(clock);
        self.slow_step = step;
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn object(&self, id: i64, placeholder: bool) -> Box<dyn Target> {
        Box::new(Recorded {
            kind: self.name.clone(),
            id,
            placeholder,
            calls: self.calls.clone(),
            clock: self.clock.clone(),
            slow_step: self.slow_step,
        })
    }
}

#[async_trait]
impl TargetKind for RecordingKind {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, id: i64) -> Result<Option<Box<dyn Target>>, ActionError> {
        if self.broken_lookup {
            return Err(ActionError::new("lookup backend unavailable"));
        }
        let exists = self.live.lock().contains(&id);
        Ok(exists.then(|| self.object(id, false)))
    }

    fn placeholder(&self, id: i64) -> Box<dyn Target> {
        self.object(id, true)
    }
}

/// Registry holding a single kind.
pub(crate) fn registry_with(kind: Arc<RecordingKind>) -> Arc<TargetRegistry> {
    let registry = TargetRegistry::new();
    registry.register(kind).unwrap();
    Arc::new(registry)
}

/// Memory store that counts batch operations.
#[derive(Default)]
pub(crate) struct CountingStore {
    pub inner: MemoryEntryStore,
    pub deletes: AtomicUsize,
    pub inserts: AtomicUsize,
    /// Every `update` fails with a database error.
    pub fail_updates: AtomicBool,
}

impl CountingStore {
    pub(crate) fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub(crate) fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntryStore for CountingStore {
    async fn insert(&self, entries: Vec<NewEntry>) -> Result<Vec<QueueEntry>, QueueError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(entries).await
    }

    async fn load(&self, id: i64) -> Result<Option<QueueEntry>, QueueError> {
        self.inner.load(id).await
    }

    async fn delete_pending(&self, kind: &str, ids: &[i64]) -> Result<usize, QueueError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_pending(kind, ids).await
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<QueueEntry>, QueueError> {
        self.inner.due(now).await
    }

    async fn update(&self, entry: &QueueEntry) -> Result<(), QueueError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(QueueError::Database("disk I/O error".to_string()));
        }
        self.inner.update(entry).await
    }

    async fn count_pending(&self) -> Result<usize, QueueError> {
        self.inner.count_pending().await
    }

    async fn count_executed(&self, before: Option<DateTime<Utc>>) -> Result<usize, QueueError> {
        self.inner.count_executed(before).await
    }

    async fn delete_executed(&self, before: Option<DateTime<Utc>>) -> Result<usize, QueueError> {
        self.inner.delete_executed(before).await
    }
}
