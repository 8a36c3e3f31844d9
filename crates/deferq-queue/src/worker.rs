//! Processing of a single queue entry.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::clock::Clock;
use crate::config::ResolveFailurePolicy;
use crate::entry::QueueEntry;
use crate::error::{ActionError, QueueError, ResolveError};
use crate::resolver::{Target, TargetKind, TargetResolver};
use crate::store::EntryStore;

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;

/// Result of processing one entry. In every case the entry has been stamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The action ran to completion.
    Succeeded,
    /// The action returned an error or panicked.
    ActionFailed(String),
    /// The target could not be resolved.
    ResolveFailed(String),
}

impl EntryOutcome {
    /// Check if the entry failed in any way.
    pub fn is_failure(&self) -> bool {
        !matches!(self, EntryOutcome::Succeeded)
    }
}

enum DispatchError {
    Resolve(ResolveError),
    Action(ActionError),
}

/// Runs entries against their targets, one at a time.
pub struct Worker {
    store: Arc<dyn EntryStore>,
    resolver: Arc<dyn TargetResolver>,
    clock: Arc<dyn Clock>,
    policy: ResolveFailurePolicy,
    entries_succeeded: AtomicU64,
    entries_failed: AtomicU64,
}

impl Worker {
    /// Create a new worker.
    pub fn new(
        store: Arc<dyn EntryStore>,
        resolver: Arc<dyn TargetResolver>,
        clock: Arc<dyn Clock>,
        policy: ResolveFailurePolicy,
    ) -> Self {
        Self {
            store,
            resolver,
            clock,
            policy,
            entries_succeeded: AtomicU64::new(0),
            entries_failed: AtomicU64::new(0),
        }
    }

    /// Get succeeded entry count.
    pub fn entries_succeeded(&self) -> u64 {
        self.entries_succeeded.load(Ordering::SeqCst)
    }

    /// Get failed entry count.
    pub fn entries_failed(&self) -> u64 {
        self.entries_failed.load(Ordering::SeqCst)
    }

    /// Process one entry.
    ///
    /// Failures of the action or of target resolution are logged and
    /// swallowed. Whatever happens, the entry is stamped with
    /// `executed_at` and written back exactly once. An entry deleted from the
    /// store in the meantime is logged and skipped. Only a store error, or a
    /// resolution failure under [`ResolveFailurePolicy::Abort`], is returned
    /// as `Err`, and in the latter case the stamp has already been written.
    pub async fn process(&self, mut entry: QueueEntry) -> Result<EntryOutcome, QueueError> {
        debug!(
            "Processing queue entry #{} ({} / id={}): {}",
            entry.id, entry.target_kind, entry.target_id, entry.action
        );

        let dispatched = AssertUnwindSafe(self.dispatch(&entry)).catch_unwind().await;

        let mut abort = None;
        let outcome = match dispatched {
            Ok(Ok(())) => EntryOutcome::Succeeded,
            Ok(Err(DispatchError::Action(err))) => {
                log_failure(&entry, &err.to_string(), err.location());
                EntryOutcome::ActionFailed(err.to_string())
            }
            Err(payload) => {
                let err = ActionError::panicked(panic_message(payload.as_ref()));
                log_failure(&entry, &err.to_string(), err.location());
                EntryOutcome::ActionFailed(err.to_string())
            }
            Ok(Err(DispatchError::Resolve(err))) => {
                log_failure(&entry, &err.to_string(), err.location());
                let outcome = EntryOutcome::ResolveFailed(err.to_string());
                if self.policy == ResolveFailurePolicy::Abort {
                    abort = Some(err);
                }
                outcome
            }
        };

        entry.mark_executed(self.clock.now());
        match self.store.update(&entry).await {
            Ok(()) => {}
            // Deleted by a re-enqueue while the action was running.
            Err(QueueError::EntryNotFound(id)) => {
                warn!(
                    entry_id = id,
                    target_kind = %entry.target_kind,
                    target_id = entry.target_id,
                    "Queue entry #{} was removed while processing, stamp dropped",
                    id
                );
            }
            Err(e) => return Err(e),
        }

        if outcome.is_failure() {
            self.entries_failed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.entries_succeeded.fetch_add(1, Ordering::SeqCst);
        }

        match abort {
            Some(source) => Err(QueueError::Resolve {
                entry_id: entry.id,
                source,
            }),
            None => Ok(outcome),
        }
    }

    async fn dispatch(&self, entry: &QueueEntry) -> Result<(), DispatchError> {
        let kind = self
            .resolver
            .resolve_kind(&entry.target_kind)
            .ok_or_else(|| {
                DispatchError::Resolve(ResolveError::UnknownKind(entry.target_kind.clone()))
            })?;

        let target = self
            .resolve_target(kind.as_ref(), entry)
            .await
            .map_err(DispatchError::Resolve)?;

        target
            .perform(&entry.action)
            .await
            .map_err(DispatchError::Action)
    }

    async fn resolve_target(
        &self,
        kind: &dyn TargetKind,
        entry: &QueueEntry,
    ) -> Result<Box<dyn Target>, ResolveError> {
        if entry.tombstoned {
            return Ok(kind.placeholder(entry.target_id));
        }

        let loaded = kind
            .load(entry.target_id)
            .await
            .map_err(|source| ResolveError::Lookup {
                kind: entry.target_kind.clone(),
                id: entry.target_id,
                source,
            })?;

        match loaded {
            Some(target) => Ok(target),
            None => {
                debug!(
                    "Queue entry #{}: {} id={} no longer exists, using placeholder",
                    entry.id, entry.target_kind, entry.target_id
                );
                Ok(kind.placeholder(entry.target_id))
            }
        }
    }
}

fn log_failure(
    entry: &QueueEntry,
    message: &str,
    location: Option<&'static std::panic::Location<'static>>,
) {
    let location = location
        .map(|l| l.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    error!(
        entry_id = entry.id,
        target_kind = %entry.target_kind,
        target_id = entry.target_id,
        action = %entry.action,
        error = %message,
        location = %location,
        "(Queue #{}) Error processing ({} / id={}): {} (in {})",
        entry.id,
        entry.target_kind,
        entry.target_id,
        message,
        location
    );
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
