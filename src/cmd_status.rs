//! `status` subcommand handler.

use std::io::Write;

use deferq_queue::DeferredQueue;

/// Print pending, due and executed counts.
pub(crate) async fn handle_status(
    queue: &DeferredQueue,
    json: bool,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let stats = queue.stats().await?;

    if json {
        writeln!(out, "{}", serde_json::to_string(&stats)?)?;
    } else {
        writeln!(out, "Pending:  {}", stats.pending)?;
        writeln!(out, "Due:      {}", stats.due)?;
        writeln!(out, "Executed: {}", stats.executed)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use deferq_queue::{EnqueueOptions, QueueConfig, TargetRef};

    use crate::test_support::queue_with;

    #[tokio::test]
    async fn test_status_counts() {
        let (queue, _kind) = queue_with(QueueConfig::default()).await;
        queue
            .enqueue(&[TargetRef::new("note", 1)], "touch", EnqueueOptions::default())
            .await
            .unwrap();
        queue.drain(None).await.unwrap();
        queue
            .enqueue(
                &[TargetRef::new("note", 2)],
                "touch",
                EnqueueOptions::default().due_at(Utc::now() + Duration::hours(1)),
            )
            .await
            .unwrap();

        let mut out = Vec::new();
        handle_status(&queue, false, &mut out).await.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Pending:  1\nDue:      0\nExecuted: 1\n"
        );

        let mut out = Vec::new();
        handle_status(&queue, true, &mut out).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["pending"], 1);
        assert_eq!(value["executed"], 1);
    }
}
