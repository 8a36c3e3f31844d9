//! deferq - persistent deferred-action queue.
//!
//! The `deferq` binary drives a queue whose targets are resolved through a
//! [`TargetRegistry`]. Applications that own domain objects build their own
//! binary around [`run`] after registering their target kinds:
//!
//! ```no_run
//! use deferq::queue::TargetRegistry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = TargetRegistry::new();
//!     // registry.register(Arc::new(ArticleKind::new(pool)))?;
//!     deferq::run(registry).await
//! }
//! ```

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use deferq_config::ConfigValidator;
use deferq_queue::{DeferredQueue, QueueConfig, QueueError, TargetRegistry};
use deferq_store_sqlite::SqliteEntryStore;

mod cli;
mod cmd_cleanup;
mod cmd_enqueue;
mod cmd_process;
mod cmd_status;
mod logging;
mod settings;

#[cfg(test)]
mod test_support;

pub use deferq_config as config;
pub use deferq_queue as queue;
pub use deferq_store_sqlite as store_sqlite;

use cli::{Cli, Commands};
use cmd_enqueue::EnqueueRequest;

/// Parse the process arguments and run one subcommand.
pub async fn run(registry: TargetRegistry) -> Result<(), Box<dyn std::error::Error>> {
    run_cli(Cli::parse(), registry).await
}

async fn run_cli(cli: Cli, registry: TargetRegistry) -> Result<(), Box<dyn std::error::Error>> {
    let config = settings::load_config(&cli)?;
    logging::init_tracing(&config.logging)?;

    let validation = ConfigValidator::ensure_valid(&config)?;
    for warning in &validation.warnings {
        warn!("{}: {}", warning.path, warning.message);
    }

    let result = dispatch(cli.command, &config, registry).await;
    if let Err(e) = &result {
        error!("deferq failed: {}", e);
    }
    result
}

async fn dispatch(
    command: Commands,
    config: &deferq_config::Config,
    registry: TargetRegistry,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Opening queue store at {}", config.store.path.display());
    let store = SqliteEntryStore::open(&config.store.path).await?;

    let registry = Arc::new(registry);
    if registry.is_empty() {
        // Every entry would resolve as an unknown kind and be stamped as executed.
        if matches!(command, Commands::Process { .. }) {
            return Err(QueueError::InvalidArgument(
                "no target kinds are registered in this binary, refusing to process the queue"
                    .to_string(),
            )
            .into());
        }
        warn!("No target kinds registered, queued entries cannot be resolved");
    }
    let queue = DeferredQueue::new(
        QueueConfig::from(&config.worker),
        Arc::new(store),
        registry.clone(),
    );

    let mut out = std::io::stdout();
    match command {
        Commands::Process { once, .. } => cmd_process::handle_process(&queue, once, &mut out).await,
        Commands::Cleanup { all, threshold } => {
            cmd_cleanup::handle_cleanup(&queue, all, threshold, &mut out).await
        }
        Commands::Enqueue {
            kind,
            ids,
            action,
            delay,
            tombstoned,
        } => {
            let request = EnqueueRequest {
                kind,
                ids,
                action,
                delay_secs: delay,
                tombstoned,
            };
            cmd_enqueue::handle_enqueue(&queue, &registry, request, &mut out).await
        }
        Commands::Status { json } => cmd_status::handle_status(&queue, json, &mut out).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deferq_config::Config;
    use deferq_queue::EntryStore;

    #[tokio::test]
    async fn test_dispatch_against_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.path = dir.path().join("queue.db");

        let enqueue = Commands::Enqueue {
            kind: "note".to_string(),
            ids: vec![1, 2],
            action: "touch".to_string(),
            delay: None,
            tombstoned: false,
        };
        dispatch(enqueue, &config, test_support::registry()).await.unwrap();

        let process = Commands::Process {
            once: true,
            execution_time: None,
            polling_interval: None,
        };
        dispatch(process, &config, test_support::registry()).await.unwrap();

        let store = SqliteEntryStore::open(&config.store.path).await.unwrap();
        assert_eq!(store.count_pending().await.unwrap(), 0);
        assert_eq!(store.count_executed(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_reports_store_errors() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut config = Config::default();
        // A regular file cannot be a parent directory.
        config.store.path = file.path().join("queue.db");

        let result = dispatch(Commands::Status { json: false }, &config, TargetRegistry::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_process_refused_without_registered_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.path = dir.path().join("queue.db");

        let enqueue = Commands::Enqueue {
            kind: "note".to_string(),
            ids: vec![1, 2],
            action: "touch".to_string(),
            delay: None,
            tombstoned: false,
        };
        dispatch(enqueue, &config, TargetRegistry::new()).await.unwrap();

        let process = Commands::Process {
            once: true,
            execution_time: None,
            polling_interval: None,
        };
        let err = dispatch(process, &config, TargetRegistry::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no target kinds"));

        let store = SqliteEntryStore::open(&config.store.path).await.unwrap();
        assert_eq!(store.count_pending().await.unwrap(), 2);
        assert_eq!(store.count_executed(None).await.unwrap(), 0);
    }
}
