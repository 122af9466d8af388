/// Migration Checkpoint Persistence
///
/// Durable + in-memory persistence of migration checkpoints. The in-memory
/// map is the source of truth for the process lifetime; the configured
/// storage adapter is a best-effort durable mirror, read through on cache
/// miss and written through on save.

pub mod disk;
pub mod store;

pub use disk::DiskStorageAdapter;
pub use store::CheckpointStorage;

use crate::did::TrustLayer;
use crate::error::AnchorResult;
use crate::provider::AnchorReceipt;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable key-value storage behind the checkpoint cache.
///
/// Keys are namespaced paths such as `checkpoints/<id>.json`.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Store a value under a key
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> AnchorResult<()>;

    /// Retrieve a value, `None` if absent
    async fn get(&self, key: &str) -> AnchorResult<Option<Vec<u8>>>;

    /// Delete a value (absent keys are not an error)
    async fn delete(&self, key: &str) -> AnchorResult<()>;
}

/// Steps of the migration state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MigrationStep {
    Initiated,
    ContentAnchoring,
    AwaitingConfirmation,
    Verifying,
    Completed,
    Failed,
}

impl MigrationStep {
    /// Whether the state machine can advance from this step
    pub fn is_terminal(self) -> bool {
        matches!(self, MigrationStep::Completed | MigrationStep::Failed)
    }
}

impl std::fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MigrationStep::Initiated => "initiated",
            MigrationStep::ContentAnchoring => "contentAnchoring",
            MigrationStep::AwaitingConfirmation => "awaitingConfirmation",
            MigrationStep::Verifying => "verifying",
            MigrationStep::Completed => "completed",
            MigrationStep::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Persisted snapshot of a migration in progress
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationCheckpoint {
    pub checkpoint_id: String,
    pub asset_id: String,
    pub from_layer: TrustLayer,
    pub to_layer: TrustLayer,
    pub step: MigrationStep,
    pub timestamp: DateTime<Utc>,
    pub transaction_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
    /// Broadcast receipt, recorded so a resumed migration can skip the
    /// anchoring step and reconstruct the anchored DID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<AnchorReceipt>,
}

impl MigrationCheckpoint {
    /// Deterministic checkpoint id for a migration, so a restarted process
    /// can locate the durable record without an index
    pub fn id_for(asset_id: &str, target: TrustLayer) -> String {
        format!("{}:{}", asset_id, target)
    }

    /// Fresh checkpoint at the `Initiated` step
    pub fn new(asset_id: &str, from: TrustLayer, to: TrustLayer) -> Self {
        Self {
            checkpoint_id: Self::id_for(asset_id, to),
            asset_id: asset_id.to_string(),
            from_layer: from,
            to_layer: to,
            step: MigrationStep::Initiated,
            timestamp: Utc::now(),
            transaction_ids: Vec::new(),
            error: None,
            attempts: 0,
            receipt: None,
        }
    }

    /// Advance to a new step, stamping the transition time
    pub fn advance(&mut self, step: MigrationStep) {
        self.step = step;
        self.timestamp = Utc::now();
    }

    /// Enter the absorbing failure state, retaining the causal reason
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.step = MigrationStep::Failed;
        self.error = Some(reason.into());
        self.timestamp = Utc::now();
    }
}
