//! Polling driver for the `process` command.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::queue::DeferredQueue;

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;

/// How a `process` run drains the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessMode {
    /// One unbudgeted pass, then return.
    Once,
    /// Poll for `execution_time_secs`, sleeping `polling_interval_secs`
    /// between passes.
    Continuous {
        execution_time_secs: u64,
        polling_interval_secs: u64,
    },
}

impl ProcessMode {
    /// Build a mode from the queue configuration.
    pub fn from_config(config: &QueueConfig, once: bool) -> Self {
        if once {
            ProcessMode::Once
        } else {
            ProcessMode::Continuous {
                execution_time_secs: config.execution_time_secs,
                polling_interval_secs: config.polling_interval_secs,
            }
        }
    }
}

/// Number of drain passes a continuous run makes.
///
/// `execution_time / polling_interval - 1`, never below zero.
pub fn iteration_count(execution_time_secs: u64, polling_interval_secs: u64) -> u64 {
    (execution_time_secs / polling_interval_secs).saturating_sub(1)
}

/// Totals over a `process` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub passes: u64,
    pub processed: usize,
    pub failed: usize,
}

/// Drive the queue according to `mode`.
///
/// Store errors (and resolve errors under the `abort` policy) end the run.
pub async fn run_process(
    queue: &DeferredQueue,
    mode: ProcessMode,
) -> Result<ProcessSummary, QueueError> {
    let mut summary = ProcessSummary::default();

    match mode {
        ProcessMode::Once => {
            let report = queue.drain(None).await?;
            summary.passes = 1;
            summary.processed = report.processed.len();
            summary.failed = report.failed.len();
        }
        ProcessMode::Continuous {
            execution_time_secs,
            polling_interval_secs,
        } => {
            if polling_interval_secs == 0 {
                return Err(QueueError::InvalidArgument(
                    "polling interval must be greater than 0".to_string(),
                ));
            }

            let passes = iteration_count(execution_time_secs, polling_interval_secs);
            let budget = Duration::from_secs(execution_time_secs) / 2;
            let interval = Duration::from_secs(polling_interval_secs);
            info!(
                "Polling every {}s for {}s ({} passes)",
                polling_interval_secs, execution_time_secs, passes
            );

            for pass in 0..passes {
                let report = queue.drain(Some(budget)).await?;
                debug!(
                    "Pass {}: {} processed, {} failed",
                    pass + 1,
                    report.processed.len(),
                    report.failed.len()
                );
                summary.passes += 1;
                summary.processed += report.processed.len();
                summary.failed += report.failed.len();
                tokio::time::sleep(interval).await;
            }
        }
    }

    info!(
        "Queue processing finished: {} passes, {} entries, {} failed",
        summary.passes, summary.processed, summary.failed
    );
    Ok(summary)
}
