//! `cleanup` subcommand handler.

use std::io::Write;

use tracing::debug;

use deferq_queue::{Cleanup, DeferredQueue};

/// Delete executed entries. `--all` wins over `--threshold`; neither is a no-op.
pub(crate) async fn handle_cleanup(
    queue: &DeferredQueue,
    all: bool,
    threshold: Option<i64>,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(mode) = Cleanup::from_flags(all, threshold) else {
        debug!("cleanup called without --all or --threshold, nothing to do");
        return Ok(());
    };

    let plan = queue.plan_cleanup(mode).await?;
    writeln!(out, "Deleting {} executed queue item(s)...", plan.count)?;
    queue.purge(&plan).await?;
    Ok(())
}
