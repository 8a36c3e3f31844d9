//! Resolve the effective configuration from the config file and CLI flags.

use std::path::PathBuf;

use deferq_config::{Config, ConfigError, ConfigLoader};

use crate::cli::{Cli, Commands};

/// Load the config file (defaults when it does not exist) and apply CLI overrides.
pub(crate) fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = ConfigLoader::load_or_default(&cli.config)?;
    apply_overrides(&mut config, cli);
    Ok(config)
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(db) = &cli.db {
        config.store.path = PathBuf::from(ConfigLoader::expand_path(&db.to_string_lossy()));
    }

    if let Commands::Process {
        execution_time,
        polling_interval,
        ..
    } = &cli.command
    {
        if let Some(secs) = execution_time {
            config.worker.execution_time_secs = *secs;
        }
        if let Some(secs) = polling_interval {
            config.worker.polling_interval_secs = *secs;
        }
    }
}
