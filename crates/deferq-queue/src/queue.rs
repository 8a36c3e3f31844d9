//! Deduplicating deferred queue.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::QueueConfig;
use crate::entry::{AsTarget, NewEntry, QueueEntry};
use crate::error::QueueError;
use crate::resolver::TargetResolver;
use crate::store::EntryStore;
use crate::worker::{EntryOutcome, Worker};

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

/// Options for [`DeferredQueue::enqueue`].
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Earliest execution time (None = now).
    pub due_at: Option<DateTime<Utc>>,
    /// Targets are gone; process against placeholders.
    pub tombstoned: bool,
}

impl EnqueueOptions {
    /// Set the due time.
    pub fn due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    /// Mark the targets as gone.
    pub fn tombstoned(mut self) -> Self {
        self.tombstoned = true;
        self
    }
}

/// A failed entry in a drain pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub entry_id: i64,
    pub message: String,
}

/// Summary of one drain call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Entries processed, in order.
    pub processed: Vec<i64>,
    /// Entries whose action or resolution failed.
    pub failed: Vec<FailedEntry>,
    /// Candidates left pending because the budget ran out.
    pub deferred: usize,
    /// Candidates removed or executed by someone else before their turn.
    pub skipped: usize,
}

impl DrainReport {
    /// Number of entries that ran without error.
    pub fn succeeded(&self) -> usize {
        self.processed.len() - self.failed.len()
    }

    /// Check if the budget stopped the pass early.
    pub fn hit_budget(&self) -> bool {
        self.deferred > 0
    }
}

/// What [`DeferredQueue::cleanup`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    /// Every executed entry.
    All,
    /// Executed entries with `executed_at <= now + age`. Pass a negative age
    /// for "older than".
    Threshold(chrono::Duration),
}

impl Cleanup {
    /// Pick a mode from command-line style flags. `all` wins over a threshold.
    pub fn from_flags(all: bool, threshold_secs: Option<i64>) -> Option<Self> {
        if all {
            return Some(Cleanup::All);
        }
        // chrono durations hold at most i64::MAX milliseconds
        const MAX_SECS: i64 = i64::MAX / 1_000;
        threshold_secs
            .map(|secs| Cleanup::Threshold(chrono::Duration::seconds(secs.clamp(-MAX_SECS, MAX_SECS))))
    }
}

/// A resolved cleanup: the cutoff and how many entries it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPlan {
    /// None = all executed entries.
    pub cutoff: Option<DateTime<Utc>>,
    /// Entries matching at planning time.
    pub count: usize,
}

/// Queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub due: usize,
    pub executed: usize,
}

/// Persistent deferred-action queue.
pub struct DeferredQueue {
    config: QueueConfig,
    store: Arc<dyn EntryStore>,
    clock: Arc<dyn Clock>,
    worker: Worker,
}

impl DeferredQueue {
    /// Create a queue on the system clock.
    pub fn new(
        config: QueueConfig,
        store: Arc<dyn EntryStore>,
        resolver: Arc<dyn TargetResolver>,
    ) -> Self {
        Self::with_clock(config, store, resolver, Arc::new(SystemClock))
    }

    /// Create a queue with a custom clock.
    pub fn with_clock(
        config: QueueConfig,
        store: Arc<dyn EntryStore>,
        resolver: Arc<dyn TargetResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let worker = Worker::new(store.clone(), resolver, clock.clone(), config.resolve_failure);
        Self {
            config,
            store,
            clock,
            worker,
        }
    }

    /// Queue configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<dyn EntryStore> {
        &self.store
    }

    /// Worker that processes entries.
    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    /// Enqueue `action` for every target.
    ///
    /// Any pending entry for the same `(kind, id)` is deleted first, so only
    /// the latest enqueue fires. Executed entries are left alone. Targets are
    /// grouped by kind: one delete and one bulk insert per kind. A target
    /// repeated within the call is inserted once.
    pub async fn enqueue<T: AsTarget>(
        &self,
        targets: &[T],
        action: &str,
        options: EnqueueOptions,
    ) -> Result<Vec<QueueEntry>, QueueError> {
        if targets.is_empty() {
            return Err(QueueError::EmptyEnqueue);
        }

        let now = self.clock.now();
        let due_at = options.due_at.unwrap_or(now);

        let mut by_kind: BTreeMap<String, BTreeSet<i64>> = BTreeMap::new();
        for target in targets {
            let target = target.target_ref();
            by_kind.entry(target.kind).or_default().insert(target.id);
        }

        let mut created = Vec::with_capacity(targets.len());
        for (kind, ids) in by_kind {
            let ids: Vec<i64> = ids.into_iter().collect();

            let replaced = self.store.delete_pending(&kind, &ids).await?;
            if replaced > 0 {
                debug!("Replaced {} pending {} entries", replaced, kind);
            }

            let batch = ids
                .iter()
                .map(|&id| NewEntry {
                    target_kind: kind.clone(),
                    target_id: id,
                    action: action.to_string(),
                    tombstoned: options.tombstoned,
                    created_at: now,
                    due_at,
                })
                .collect();
            created.extend(self.store.insert(batch).await?);
        }

        debug!("Enqueued {} entries for action '{}'", created.len(), action);
        Ok(created)
    }

    /// Pending entries due now, oldest due first.
    pub async fn due_entries(&self) -> Result<Vec<QueueEntry>, QueueError> {
        self.store.due(self.clock.now()).await
    }

    /// Process due entries, stopping between entries once `budget` is spent.
    ///
    /// Each candidate is re-read right before it runs. Entries replaced by a
    /// re-enqueue or executed elsewhere in the meantime are skipped.
    pub async fn drain(&self, budget: Option<Duration>) -> Result<DrainReport, QueueError> {
        let started = self.clock.now();
        let candidates = self.store.due(started).await?;
        self.run_pass(started, candidates, budget, true).await
    }

    /// Process a caller-selected set of entries as given.
    ///
    /// No due/pending filter and no reordering is applied.
    pub async fn drain_entries(
        &self,
        entries: Vec<QueueEntry>,
        budget: Option<Duration>,
    ) -> Result<DrainReport, QueueError> {
        let started = self.clock.now();
        self.run_pass(started, entries, budget, false).await
    }

    async fn run_pass(
        &self,
        started: DateTime<Utc>,
        candidates: Vec<QueueEntry>,
        budget: Option<Duration>,
        recheck: bool,
    ) -> Result<DrainReport, QueueError> {
        let mut report = DrainReport::default();
        let total = candidates.len();

        for (index, entry) in candidates.into_iter().enumerate() {
            if let Some(budget) = budget {
                let elapsed = (self.clock.now() - started).to_std().unwrap_or_default();
                if elapsed >= budget {
                    report.deferred = total - index;
                    warn!(
                        "Execution budget of {:?} spent after {} entries, {} left pending",
                        budget,
                        index,
                        report.deferred
                    );
                    break;
                }
            }

            // Candidates are a snapshot; a re-enqueue may have replaced one since.
            let entry = if recheck {
                match self.store.load(entry.id).await? {
                    Some(current) if current.is_pending() => current,
                    _ => {
                        debug!(
                            "Queue entry #{} ({} / id={}) is gone or already executed, skipping",
                            entry.id, entry.target_kind, entry.target_id
                        );
                        report.skipped += 1;
                        continue;
                    }
                }
            } else {
                entry
            };

            let entry_id = entry.id;
            match self.worker.process(entry).await? {
                EntryOutcome::Succeeded => {}
                EntryOutcome::ActionFailed(message) | EntryOutcome::ResolveFailed(message) => {
                    report.failed.push(FailedEntry { entry_id, message });
                }
            }
            report.processed.push(entry_id);
        }

        if !report.processed.is_empty() {
            info!(
                "Processed {} queue entries ({} failed)",
                report.processed.len(),
                report.failed.len()
            );
        }
        Ok(report)
    }

    /// Resolve a cleanup mode against the current time and count its matches.
    pub async fn plan_cleanup(&self, mode: Cleanup) -> Result<CleanupPlan, QueueError> {
        let cutoff = match mode {
            Cleanup::All => None,
            Cleanup::Threshold(age) => {
                let cutoff = self.clock.now().checked_add_signed(age).ok_or_else(|| {
                    QueueError::InvalidArgument(format!("cleanup threshold out of range: {}", age))
                })?;
                Some(cutoff)
            }
        };

        let count = self.store.count_executed(cutoff).await?;
        Ok(CleanupPlan { cutoff, count })
    }

    /// Delete the entries a plan describes. Returns the number deleted.
    pub async fn purge(&self, plan: &CleanupPlan) -> Result<usize, QueueError> {
        let deleted = self.store.delete_executed(plan.cutoff).await?;
        info!("Deleted {} executed queue entries", deleted);
        Ok(deleted)
    }

    /// Plan and purge in one step.
    pub async fn cleanup(&self, mode: Cleanup) -> Result<usize, QueueError> {
        let plan = self.plan_cleanup(mode).await?;
        info!("Deleting {} executed queue item(s)...", plan.count);
        self.purge(&plan).await
    }

    /// Current counters.
    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        Ok(QueueStats {
            pending: self.store.count_pending().await?,
            due: self.due_entries().await?.len(),
            executed: self.store.count_executed(None).await?,
        })
    }
}
