//! JSON-lines export of usage records.

use docforge_core::UsageRecord;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Drain `rx` into `path`, one JSON object per line, appending to existing content.
///
/// The task finishes once every sender is gone and returns the number of
/// records written.
pub fn spawn_jsonl_exporter(
    mut rx: mpsc::UnboundedReceiver<UsageRecord>,
    path: PathBuf,
) -> JoinHandle<std::io::Result<usize>> {
    tokio::spawn(async move {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let mut written = 0;
        while let Some(record) = rx.recv().await {
            let mut line = serde_json::to_string(&record)?;
            line.push('\n');
            file.write_all(line.as_bytes()).await?;
            written += 1;
        }
        file.flush().await?;
        tracing::debug!(path = %path.display(), written, "Usage export finished");
        Ok(written)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.jsonl");
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_jsonl_exporter(rx, path.clone());

        for attempt in 1..=2 {
            tx.send(UsageRecord {
                task_id: "t".into(),
                tier: "fast".into(),
                attempt,
                input_tokens: 1,
                output_tokens: 1,
                estimated_cost: 0.0,
                recorded_at: Utc::now(),
            })
            .unwrap();
        }
        drop(tx);

        assert_eq!(handle.await.unwrap().unwrap(), 2);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains(r#""attempt":2"#));
    }
}
