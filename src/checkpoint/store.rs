/// Checkpoint store
///
/// In-memory map of checkpoints with a best-effort durable mirror. Durable
/// failures degrade durability, never an in-progress migration: writes and
/// deletes that fail are logged and swallowed, and the in-memory copy stays
/// authoritative for the rest of the process lifetime.
use crate::checkpoint::{MigrationCheckpoint, StorageAdapter};
use crate::error::{AnchorError, AnchorResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Key namespace for durable checkpoint records
fn storage_key(checkpoint_id: &str) -> String {
    format!("checkpoints/{}.json", checkpoint_id)
}

/// Durable + in-memory checkpoint persistence
#[derive(Clone)]
pub struct CheckpointStorage {
    cache: Arc<RwLock<HashMap<String, MigrationCheckpoint>>>,
    adapter: Option<Arc<dyn StorageAdapter>>,
}

impl CheckpointStorage {
    /// In-memory only storage (checkpoints die with the process)
    pub fn in_memory() -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            adapter: None,
        }
    }

    /// Storage mirrored to a durable adapter
    pub fn with_adapter(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            adapter: Some(adapter),
        }
    }

    /// Save a checkpoint: unconditionally to memory, best-effort durably
    pub async fn save(&self, checkpoint: &MigrationCheckpoint) -> AnchorResult<()> {
        if checkpoint.checkpoint_id.is_empty() {
            return Err(AnchorError::Validation(
                "checkpoint id must not be empty".to_string(),
            ));
        }

        self.cache
            .write()
            .await
            .insert(checkpoint.checkpoint_id.clone(), checkpoint.clone());

        if let Some(adapter) = &self.adapter {
            let key = storage_key(&checkpoint.checkpoint_id);
            match serde_json::to_vec(checkpoint) {
                Ok(bytes) => {
                    if let Err(e) = adapter.put(&key, bytes, "application/json").await {
                        warn!("Durable checkpoint write failed for {}: {}", key, e);
                    }
                }
                Err(e) => warn!("Checkpoint {} not serializable: {}", key, e),
            }
        }

        debug!(
            "Saved checkpoint {} at step {}",
            checkpoint.checkpoint_id, checkpoint.step
        );
        Ok(())
    }

    /// Fetch a checkpoint, reading through to the durable adapter on a cache
    /// miss. A durable miss or failure yields `None`, not an error.
    pub async fn get(&self, checkpoint_id: &str) -> Option<MigrationCheckpoint> {
        if let Some(found) = self.cache.read().await.get(checkpoint_id) {
            return Some(found.clone());
        }

        let adapter = self.adapter.as_ref()?;
        let key = storage_key(checkpoint_id);
        match adapter.get(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<MigrationCheckpoint>(&bytes) {
                Ok(checkpoint) => {
                    debug!("Loaded checkpoint {} from durable storage", checkpoint_id);
                    self.cache
                        .write()
                        .await
                        .insert(checkpoint_id.to_string(), checkpoint.clone());
                    Some(checkpoint)
                }
                Err(e) => {
                    warn!("Durable checkpoint {} is corrupt: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Durable checkpoint read failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Delete a checkpoint from memory and, best-effort, durably
    pub async fn delete(&self, checkpoint_id: &str) {
        self.cache.write().await.remove(checkpoint_id);

        if let Some(adapter) = &self.adapter {
            let key = storage_key(checkpoint_id);
            if let Err(e) = adapter.delete(&key).await {
                warn!("Durable checkpoint delete failed for {}: {}", key, e);
            }
        }
    }

    /// Delete every checkpoint whose timestamp precedes `cutoff`, one at a
    /// time so durable deletion is attempted for each. Returns the count.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let stale: Vec<String> = self
            .cache
            .read()
            .await
            .values()
            .filter(|c| c.timestamp < cutoff)
            .map(|c| c.checkpoint_id.clone())
            .collect();

        for checkpoint_id in &stale {
            self.delete(checkpoint_id).await;
        }

        if !stale.is_empty() {
            info!("Pruned {} stale checkpoint(s)", stale.len());
        }
        stale.len()
    }

    /// Checkpoints currently cached in memory
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}
