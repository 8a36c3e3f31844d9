//! CLI definitions for deferq.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// deferq CLI.
#[derive(Debug, Parser)]
#[command(name = "deferq")]
#[command(about = "Persistent deferred-action queue")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    /// Queue database path (overrides `store.path`)
    #[arg(long, env = "DEFERQ_DB", global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Execute due queue entries
    Process {
        /// Drain every due entry in one pass and exit
        #[arg(long)]
        once: bool,

        /// Seconds a continuous run keeps polling (default 300)
        #[arg(long)]
        execution_time: Option<u64>,

        /// Seconds to sleep between drain passes (default 4)
        #[arg(long)]
        polling_interval: Option<u64>,
    },

    /// Delete executed queue entries
    Cleanup {
        /// Delete every executed entry
        #[arg(long)]
        all: bool,

        /// Delete entries executed at or before now + THRESHOLD seconds
        /// (negative for "older than")
        #[arg(long, allow_negative_numbers = true)]
        threshold: Option<i64>,
    },

    /// Enqueue an action for one or more targets
    Enqueue {
        /// Target kind tag
        #[arg(long)]
        kind: String,

        /// Target id (repeatable)
        #[arg(long = "id", required = true)]
        ids: Vec<i64>,

        /// Action name
        #[arg(long)]
        action: String,

        /// Seconds from now before the entries are due
        #[arg(long)]
        delay: Option<u64>,

        /// The targets are gone; run the action on placeholders
        #[arg(long)]
        tombstoned: bool,
    },

    /// Show queue counters
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}
