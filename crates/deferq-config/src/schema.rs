//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Entry store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file. `~` is expanded by the caller.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".deferq")
        .join("queue.db")
}

/// What a drain does when an entry's target cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveFailurePolicy {
    /// Log the failure, stamp the entry and keep draining.
    #[default]
    Skip,
    /// Stamp the entry, then stop the drain with an error.
    Abort,
}

/// Queue worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Total wall-clock seconds a continuous `process` run spans.
    #[serde(default = "default_execution_time")]
    pub execution_time_secs: u64,

    /// Seconds slept between drain passes.
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,

    #[serde(default)]
    pub resolve_failure: ResolveFailurePolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            execution_time_secs: default_execution_time(),
            polling_interval_secs: default_polling_interval(),
            resolve_failure: ResolveFailurePolicy::default(),
        }
    }
}

fn default_execution_time() -> u64 {
    300
}

fn default_polling_interval() -> u64 {
    4
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files. Console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
