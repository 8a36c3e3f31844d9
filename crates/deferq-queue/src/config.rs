//! Queue configuration.

use serde::{Deserialize, Serialize};

use deferq_config::WorkerConfig;
pub use deferq_config::ResolveFailurePolicy;

/// Queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Total seconds a continuous `process` run keeps polling.
    #[serde(default = "default_execution_time")]
    pub execution_time_secs: u64,

    /// Seconds to sleep between drain calls.
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,

    /// What to do when a target cannot be resolved.
    #[serde(default)]
    pub resolve_failure: ResolveFailurePolicy,
}

fn default_execution_time() -> u64 {
    300
}

fn default_polling_interval() -> u64 {
    4
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            execution_time_secs: default_execution_time(),
            polling_interval_secs: default_polling_interval(),
            resolve_failure: ResolveFailurePolicy::default(),
        }
    }
}

impl From<&WorkerConfig> for QueueConfig {
    fn from(worker: &WorkerConfig) -> Self {
        Self {
            execution_time_secs: worker.execution_time_secs,
            polling_interval_secs: worker.polling_interval_secs,
            resolve_failure: worker.resolve_failure,
        }
    }
}
