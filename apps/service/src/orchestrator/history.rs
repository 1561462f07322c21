use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::database::Database;
use crate::database::models::HistorySample;

/// Spawn the task that persists history samples. It exits once every sender
/// is dropped and the buffer is drained.
pub fn spawn_history_writer(
    database: Arc<dyn Database>,
    capacity: usize,
) -> (mpsc::Sender<HistorySample>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(run_history_writer(database, rx));
    (tx, handle)
}

async fn run_history_writer(database: Arc<dyn Database>, mut rx: mpsc::Receiver<HistorySample>) {
    let mut written = 0u64;

    while let Some(sample) = rx.recv().await {
        match database.append_sample(&sample).await {
            Ok(()) => written += 1,
            Err(e) => warn!(target_id = %sample.target_id, "Failed to persist history sample: {:#}", e),
        }
    }

    debug!(written, "history writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::create_test_database;
    use crate::monitoring::types::TargetStatus;
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_writer_drains_buffer_before_exiting() {
        let (database, _dir) = create_test_database().await.unwrap();
        let database: Arc<dyn Database> = Arc::new(database);
        let target_id = Uuid::new_v4();

        let (tx, handle) = spawn_history_writer(database.clone(), 16);
        for latency_ms in [120, 80, 95] {
            tx.send(HistorySample { target_id, timestamp: Utc::now(), status: TargetStatus::Up, latency_ms })
                .await
                .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        let samples = database.recent_samples(target_id, 1).await.unwrap();
        assert_eq!(samples.len(), 3);
    }
}
