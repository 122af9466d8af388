/// Btco Anchor - Progressive Trust-Layer Anchoring
///
/// A Rust implementation of progressive trust anchoring for digital assets:
/// identifiers start on an ephemeral local layer (`did:peer`), can move to a
/// web-verifiable hosted layer (`did:webvh`), and end on an immutable
/// Bitcoin-ordinal-anchored layer (`did:btco`). The crate provides the
/// resolver for anchored identifiers, the resumable layer-migration state
/// machine, checkpoint persistence, and the resilience primitives that gate
/// every external call.

pub mod checkpoint;
pub mod did;
pub mod error;
pub mod jobs;
pub mod migration;
pub mod provider;
pub mod resilience;

pub use checkpoint::{CheckpointStorage, MigrationCheckpoint, MigrationStep, StorageAdapter};
pub use did::{BtcoDid, BtcoDidResolver, DidDocument, ResolutionResult, TrustLayer};
pub use error::{AnchorError, AnchorResult};
pub use migration::{Asset, AssetResource, LayerMigrationEngine, MigrationOutcome};
pub use provider::{AnchorProvider, AnchorReceipt, ResourceProvider};
pub use resilience::{CircuitBreaker, RateLimiter, RetryExecutor, RetryOptions};
