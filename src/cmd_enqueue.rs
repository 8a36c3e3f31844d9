//! `enqueue` subcommand handler.

use std::io::Write;

use chrono::{Duration, Utc};
use tracing::warn;

use deferq_queue::{DeferredQueue, EnqueueOptions, TargetRef, TargetRegistry};

/// Arguments of the `enqueue` subcommand.
#[derive(Debug, Clone)]
pub(crate) struct EnqueueRequest {
    pub kind: String,
    pub ids: Vec<i64>,
    pub action: String,
    pub delay_secs: Option<u64>,
    pub tombstoned: bool,
}

impl EnqueueRequest {
    fn options(&self) -> Result<EnqueueOptions, Box<dyn std::error::Error>> {
        let mut options = EnqueueOptions::default();
        if let Some(secs) = self.delay_secs {
            let delay = i64::try_from(secs)
                .ok()
                .and_then(Duration::try_seconds)
                .ok_or_else(|| format!("delay out of range: {}s", secs))?;
            let due_at = Utc::now()
                .checked_add_signed(delay)
                .ok_or_else(|| format!("delay out of range: {}s", secs))?;
            options = options.due_at(due_at);
        }
        if self.tombstoned {
            options = options.tombstoned();
        }
        Ok(options)
    }
}

/// Enqueue `action` for every `(kind, id)` in the request.
pub(crate) async fn handle_enqueue(
    queue: &DeferredQueue,
    registry: &TargetRegistry,
    request: EnqueueRequest,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    if !registry.contains(&request.kind) {
        warn!(
            "No target kind '{}' is registered in this binary, entries will fail to resolve here",
            request.kind
        );
    }

    let options = request.options()?;
    let targets: Vec<TargetRef> = request
        .ids
        .iter()
        .map(|id| TargetRef::new(request.kind.clone(), *id))
        .collect();

    let entries = queue.enqueue(&targets, &request.action, options).await?;
    writeln!(
        out,
        "Enqueued {} queue item(s) for '{}' ({})",
        entries.len(),
        request.kind,
        request.action
    )?;
    Ok(())
}
