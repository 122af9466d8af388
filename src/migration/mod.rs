/// Layer Migration Engine
///
/// Moves an asset's anchoring from one trust layer to a stronger one through
/// a multi-step, externally-dependent process. Progress is checkpointed at
/// every state transition so a crash mid-migration resumes at the last
/// completed step instead of re-issuing side effects; rollback is never
/// attempted, because broadcast transactions cannot be unbroadcast.

pub mod asset;

pub use asset::{Asset, AssetResource, MigrationRecord};

use crate::checkpoint::{CheckpointStorage, MigrationCheckpoint, MigrationStep};
use crate::did::{resolver::BtcoDidResolver, BtcoDid, TrustLayer};
use crate::error::{AnchorError, AnchorResult};
use crate::provider::{AnchorPayload, AnchorProvider};
use crate::resilience::{env_parse, CircuitBreaker, CircuitBreakerConfig, RetryExecutor, RetryOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Migration engine configuration
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub retry: RetryOptions,
    /// Breaker gating anchored-layer provider calls
    pub breaker: CircuitBreakerConfig,
    /// Spacing between confirmation polls
    pub confirmation_poll_interval: Duration,
    /// Polls before an unconfirmed transaction fails the migration
    pub max_confirmation_polls: u32,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            retry: RetryOptions::default(),
            breaker: CircuitBreakerConfig::default(),
            confirmation_poll_interval: Duration::from_secs(10),
            max_confirmation_polls: 90,
        }
    }
}

impl MigrationConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            retry: RetryOptions::from_env(),
            breaker: CircuitBreakerConfig::from_env(),
            confirmation_poll_interval: Duration::from_millis(env_parse(
                "MIGRATION_POLL_INTERVAL_MS",
                defaults.confirmation_poll_interval.as_millis() as u64,
            )),
            max_confirmation_polls: env_parse(
                "MIGRATION_MAX_POLLS",
                defaults.max_confirmation_polls,
            ),
        }
    }
}

/// Result of a completed migration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOutcome {
    pub asset_id: String,
    pub from_layer: TrustLayer,
    pub to_layer: TrustLayer,
    /// Identifier minted by an anchored-layer migration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
    pub transaction_ids: Vec<String>,
}

/// Drives assets from weaker trust layers to stronger ones
pub struct LayerMigrationEngine {
    anchor: Arc<dyn AnchorProvider>,
    resolver: BtcoDidResolver,
    checkpoints: CheckpointStorage,
    retry: RetryExecutor,
    breaker: CircuitBreaker,
    config: MigrationConfig,
}

impl LayerMigrationEngine {
    pub fn new(
        anchor: Arc<dyn AnchorProvider>,
        resolver: BtcoDidResolver,
        checkpoints: CheckpointStorage,
        config: MigrationConfig,
    ) -> Self {
        Self {
            anchor,
            resolver,
            checkpoints,
            retry: RetryExecutor::new(config.retry.clone()),
            breaker: CircuitBreaker::new(config.breaker.clone()),
            config,
        }
    }

    /// Migrate an asset to a stronger trust layer.
    ///
    /// Invalid transitions and integrity failures are rejected synchronously,
    /// before any checkpoint exists. An existing checkpoint for the same
    /// asset/target resumes from its recorded step. On success the asset's
    /// layer and history are updated and the checkpoint is deleted; on
    /// failure the checkpoint records the causal reason and the asset is left
    /// unchanged. Callers are responsible for serializing concurrent
    /// migrations of the same asset.
    pub async fn migrate(
        &self,
        asset: &mut Asset,
        target: TrustLayer,
    ) -> AnchorResult<MigrationOutcome> {
        if !asset.layer.can_migrate_to(target) {
            return Err(AnchorError::Validation(format!(
                "cannot migrate from {} to {}",
                asset.layer, target
            )));
        }
        for resource in &asset.resources {
            resource.verify_integrity()?;
        }

        let checkpoint_id = MigrationCheckpoint::id_for(&asset.id, target);
        let mut checkpoint = match self.checkpoints.get(&checkpoint_id).await {
            Some(existing) => {
                if existing.step == MigrationStep::Failed {
                    return Err(AnchorError::Migration(format!(
                        "migration {} previously failed ({}); delete the checkpoint to retry",
                        checkpoint_id,
                        existing.error.as_deref().unwrap_or("unknown reason")
                    )));
                }
                info!(
                    "Resuming migration {} at step {}",
                    checkpoint_id, existing.step
                );
                existing
            }
            None => {
                let fresh = MigrationCheckpoint::new(&asset.id, asset.layer, target);
                self.checkpoints.save(&fresh).await?;
                info!("Started migration {}", checkpoint_id);
                fresh
            }
        };

        checkpoint.attempts += 1;

        match self.drive(asset, target, &mut checkpoint).await {
            Ok(outcome) => {
                self.checkpoints.delete(&checkpoint.checkpoint_id).await;

                asset.layer = target;
                asset.migration_history.push(MigrationRecord {
                    from_layer: outcome.from_layer,
                    to_layer: outcome.to_layer,
                    timestamp: chrono::Utc::now(),
                    transaction_ids: outcome.transaction_ids.clone(),
                    did: outcome.did.clone(),
                });

                info!(
                    "Migration {} completed ({} -> {})",
                    outcome.asset_id, outcome.from_layer, outcome.to_layer
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!("Migration {} failed: {}", checkpoint.checkpoint_id, e);
                checkpoint.fail(e.to_string());
                if let Err(save_err) = self.checkpoints.save(&checkpoint).await {
                    warn!(
                        "Could not record failure on checkpoint {}: {}",
                        checkpoint.checkpoint_id, save_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Advance the state machine until completion, persisting every
    /// transition before the next step begins
    async fn drive(
        &self,
        asset: &Asset,
        target: TrustLayer,
        checkpoint: &mut MigrationCheckpoint,
    ) -> AnchorResult<MigrationOutcome> {
        loop {
            match checkpoint.step {
                MigrationStep::Initiated => {
                    checkpoint.advance(MigrationStep::ContentAnchoring);
                    self.checkpoints.save(checkpoint).await?;
                }
                MigrationStep::ContentAnchoring => {
                    // Idempotent re-entry: a recorded receipt means the
                    // broadcast already happened in a previous run
                    if checkpoint.receipt.is_none() {
                        let payload = AnchorPayload {
                            asset_id: asset.id.clone(),
                            target,
                            content_type: "application/json".to_string(),
                            content: serde_json::to_vec(&asset.manifest())?,
                        };

                        let receipt = if target == TrustLayer::Anchored {
                            self.retry
                                .run(|| self.breaker.exec(|| self.anchor.anchor_content(&payload)))
                                .await?
                        } else {
                            self.retry.run(|| self.anchor.anchor_content(&payload)).await?
                        };

                        info!(
                            "Anchored content for {} in transaction {}",
                            asset.id, receipt.transaction_id
                        );
                        checkpoint.transaction_ids.push(receipt.transaction_id.clone());
                        checkpoint.receipt = Some(receipt);
                    } else {
                        debug!(
                            "Migration {} already holds a receipt, skipping broadcast",
                            checkpoint.checkpoint_id
                        );
                    }

                    checkpoint.advance(MigrationStep::AwaitingConfirmation);
                    self.checkpoints.save(checkpoint).await?;
                }
                MigrationStep::AwaitingConfirmation => {
                    let transaction_id = checkpoint
                        .transaction_ids
                        .last()
                        .cloned()
                        .ok_or_else(|| {
                            AnchorError::Migration(
                                "awaiting confirmation with no recorded transaction".to_string(),
                            )
                        })?;

                    self.await_confirmation(target, &transaction_id).await?;

                    checkpoint.advance(MigrationStep::Verifying);
                    self.checkpoints.save(checkpoint).await?;
                }
                MigrationStep::Verifying => {
                    if target == TrustLayer::Anchored {
                        self.verify_anchoring(checkpoint).await?;
                    }

                    checkpoint.advance(MigrationStep::Completed);
                    self.checkpoints.save(checkpoint).await?;
                }
                MigrationStep::Completed => {
                    let did = if target == TrustLayer::Anchored {
                        checkpoint
                            .receipt
                            .as_ref()
                            .and_then(|r| r.sat)
                            .and_then(|sat| BtcoDid::from_sat(sat).ok())
                            .map(|did| did.did())
                    } else {
                        None
                    };

                    return Ok(MigrationOutcome {
                        asset_id: checkpoint.asset_id.clone(),
                        from_layer: checkpoint.from_layer,
                        to_layer: checkpoint.to_layer,
                        did,
                        transaction_ids: checkpoint.transaction_ids.clone(),
                    });
                }
                MigrationStep::Failed => {
                    return Err(AnchorError::Migration(format!(
                        "migration {} is in the failed state: {}",
                        checkpoint.checkpoint_id,
                        checkpoint.error.as_deref().unwrap_or("unknown reason")
                    )));
                }
            }
        }
    }

    /// Poll until the anchoring transaction confirms, or give up
    async fn await_confirmation(&self, target: TrustLayer, transaction_id: &str) -> AnchorResult<()> {
        for poll in 1..=self.config.max_confirmation_polls {
            let confirmed = if target == TrustLayer::Anchored {
                self.retry
                    .run(|| self.breaker.exec(|| self.anchor.is_confirmed(transaction_id)))
                    .await?
            } else {
                self.retry
                    .run(|| self.anchor.is_confirmed(transaction_id))
                    .await?
            };

            if confirmed {
                info!("Transaction {} confirmed", transaction_id);
                return Ok(());
            }

            debug!(
                "Transaction {} unconfirmed (poll {}/{})",
                transaction_id, poll, self.config.max_confirmation_polls
            );
            tokio::time::sleep(self.config.confirmation_poll_interval).await;
        }

        Err(AnchorError::Migration(format!(
            "transaction {} still unconfirmed after {} polls",
            transaction_id, self.config.max_confirmation_polls
        )))
    }

    /// Resolve the newly anchored identifier and require a matching document
    async fn verify_anchoring(&self, checkpoint: &MigrationCheckpoint) -> AnchorResult<()> {
        let sat = checkpoint
            .receipt
            .as_ref()
            .and_then(|r| r.sat)
            .ok_or_else(|| {
                AnchorError::Verification("anchoring receipt carries no satoshi".to_string())
            })?;
        let did = BtcoDid::from_sat(sat)?.did();

        let resolution = self.resolver.resolve(&did).await?;
        match resolution.did_document {
            Some(doc) if doc.id == did => {
                info!("Verified anchored document for {}", did);
                Ok(())
            }
            Some(doc) => Err(AnchorError::Verification(format!(
                "anchored document id {} does not match {}",
                doc.id, did
            ))),
            None => Err(AnchorError::Verification(format!(
                "{} did not resolve to a document ({})",
                did,
                resolution
                    .resolution_metadata
                    .error
                    .unwrap_or_else(|| "no error".to_string())
            ))),
        }
    }
}
