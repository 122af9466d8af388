/// Background maintenance jobs
use crate::checkpoint::CheckpointStorage;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

/// Periodically prunes stale migration checkpoints.
///
/// Checkpoints are deleted on success; the pruner catches the ones left
/// behind by abandoned or crashed migrations that never resumed.
pub struct CheckpointPruner {
    storage: CheckpointStorage,
    max_age: chrono::Duration,
    every: Duration,
}

impl CheckpointPruner {
    pub fn new(storage: CheckpointStorage, max_age: Duration, every: Duration) -> Self {
        Self {
            storage,
            max_age: chrono::Duration::from_std(max_age)
                .unwrap_or_else(|_| chrono::Duration::days(7)),
            every,
        }
    }

    /// Start the pruning loop
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.every);
            // The first tick completes immediately; skip it so a fresh
            // process does not prune on startup
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let cutoff = chrono::Utc::now() - self.max_age;

                let removed = self.storage.delete_older_than(cutoff).await;
                if removed > 0 {
                    info!("Checkpoint pruner removed {} stale checkpoint(s)", removed);
                }

                if self.storage.len().await > 10_000 {
                    error!("Checkpoint cache unexpectedly large; pruning may be misconfigured");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MigrationCheckpoint;
    use crate::did::TrustLayer;

    #[tokio::test]
    async fn test_pruner_removes_stale_checkpoints() {
        let storage = CheckpointStorage::in_memory();

        let mut stale = MigrationCheckpoint::new("stale", TrustLayer::Local, TrustLayer::Hosted);
        stale.timestamp = chrono::Utc::now() - chrono::Duration::hours(2);
        storage.save(&stale).await.unwrap();

        let fresh = MigrationCheckpoint::new("fresh", TrustLayer::Local, TrustLayer::Hosted);
        storage.save(&fresh).await.unwrap();

        let pruner = CheckpointPruner::new(
            storage.clone(),
            Duration::from_secs(3600),
            Duration::from_millis(10),
        );
        let handle = pruner.start();

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert!(storage.get(&stale.checkpoint_id).await.is_none());
        assert!(storage.get(&fresh.checkpoint_id).await.is_some());
    }
}
