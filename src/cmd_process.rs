//! `process` subcommand handler.

use std::io::Write;

use tracing::info;

use deferq_queue::{run_process, DeferredQueue, ProcessMode};

/// Drain the queue once or poll it for the configured execution time.
pub(crate) async fn handle_process(
    queue: &DeferredQueue,
    once: bool,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let mode = ProcessMode::from_config(queue.config(), once);
    match mode {
        ProcessMode::Once => writeln!(out, "Processing all entries in the queue...")?,
        ProcessMode::Continuous { .. } => writeln!(out, "Processing of the queue started...")?,
    }

    let summary = run_process(queue, mode).await?;
    info!(
        passes = summary.passes,
        processed = summary.processed,
        failed = summary.failed,
        "process finished"
    );
    writeln!(
        out,
        "Processed {} queue item(s), {} failed",
        summary.processed, summary.failed
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deferq_queue::{EnqueueOptions, QueueConfig, TargetRef};

    use crate::test_support::queue_with;

    #[tokio::test]
    async fn test_process_once() {
        let (queue, kind) = queue_with(QueueConfig::default()).await;
        queue
            .enqueue(
                &[TargetRef::new("note", 1), TargetRef::new("note", 2)],
                "touch",
                EnqueueOptions::default(),
            )
            .await
            .unwrap();

        let mut out = Vec::new();
        handle_process(&queue, true, &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Processing all entries in the queue..."));
        assert!(out.contains("Processed 2 queue item(s), 0 failed"));
        assert_eq!(kind.performed(), vec![(1, "touch".to_string()), (2, "touch".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_process_continuous() {
        let config = QueueConfig {
            execution_time_secs: 8,
            polling_interval_secs: 4,
            ..QueueConfig::default()
        };
        let (queue, _kind) = queue_with(config).await;
        queue
            .enqueue(&[TargetRef::new("note", 1)], "explode", EnqueueOptions::default())
            .await
            .unwrap();

        let mut out = Vec::new();
        handle_process(&queue, false, &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Processing of the queue started..."));
        assert!(out.contains("Processed 1 queue item(s), 1 failed"));
    }
}
