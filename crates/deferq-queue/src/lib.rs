//! # deferq queue
//!
//! Persistent deferred-action queue.
//!
//! ## Features
//!
//! - Deduplicating enqueue: re-enqueueing a target replaces its pending entry
//! - Due-time ordered draining with a wall-clock budget
//! - Per-entry failure isolation (errors and panics are logged, never fatal)
//! - Pluggable store and target resolver, injectable clock
//! - Cleanup of executed entries

pub mod clock;
pub mod config;
pub mod driver;
pub mod entry;
pub mod error;
pub mod queue;
pub mod resolver;
pub mod store;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{QueueConfig, ResolveFailurePolicy};
pub use driver::{iteration_count, run_process, ProcessMode, ProcessSummary};
pub use entry::{AsTarget, EntryState, NewEntry, QueueEntry, TargetRef};
pub use error::{ActionError, QueueError, ResolveError};
pub use queue::{
    Cleanup, CleanupPlan, DeferredQueue, DrainReport, EnqueueOptions, FailedEntry, QueueStats,
};
pub use resolver::{Target, TargetKind, TargetRegistry, TargetResolver};
pub use store::{EntryStore, MemoryEntryStore};
pub use worker::{EntryOutcome, Worker};
