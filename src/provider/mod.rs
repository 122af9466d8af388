/// Ordinals Provider Interfaces
///
/// Seams to the external Bitcoin/Ordinals services: a read-only indexing
/// interface used by the resolver, and a write interface used by the
/// migration engine to anchor content. Implementations talk to real nodes or
/// indexers; tests substitute mocks.

pub mod ord_rest;

pub use ord_rest::{OrdRestConfig, OrdRestProvider};

use crate::did::TrustLayer;
use crate::error::AnchorResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Inscription ids carried by a satoshi, oldest first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SatInfo {
    pub inscription_ids: Vec<String>,
}

/// Location and shape of a single inscription
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InscriptionInfo {
    pub id: String,
    pub sat: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Locator for the raw inscription content
    pub content_url: String,
}

/// Read-only access to a Bitcoin/Ordinals indexing service.
///
/// All methods may fail with transient or permanent errors; callers never
/// assume success and route every call through the resilience layer.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// All inscription ids on a satoshi, in creation (authority) order
    async fn get_sat_info(&self, sat: u64) -> AnchorResult<SatInfo>;

    /// Locate a single inscription
    async fn resolve_inscription(&self, inscription_id: &str) -> AnchorResult<InscriptionInfo>;

    /// Structured metadata attached to an inscription, if any
    async fn get_metadata(&self, inscription_id: &str) -> AnchorResult<Option<serde_json::Value>>;

    /// Fetch raw content from an inscription's content locator
    async fn fetch_content(&self, content_url: &str) -> AnchorResult<Vec<u8>>;
}

/// Payload handed to an anchoring broadcast
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorPayload {
    pub asset_id: String,
    pub target: TrustLayer,
    pub content_type: String,
    #[serde(with = "serde_bytes_base16")]
    pub content: Vec<u8>,
}

/// Receipt returned by an anchoring broadcast.
///
/// `inscription_id` and `sat` are present for anchored-layer broadcasts;
/// hosted-layer publications only carry a transaction (version) id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorReceipt {
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inscription_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat: Option<u64>,
}

/// Write access for anchoring content onto a trust layer.
///
/// Broadcast side effects are not rolled back on failure; checkpointing in
/// the migration engine is the recovery strategy.
#[async_trait]
pub trait AnchorProvider: Send + Sync {
    /// Broadcast an anchoring transaction (or publish to a host) and return
    /// its receipt. Must not be called twice for the same payload by a
    /// well-behaved caller; the engine skips it when a receipt is already
    /// checkpointed.
    async fn anchor_content(&self, payload: &AnchorPayload) -> AnchorResult<AnchorReceipt>;

    /// Whether a broadcast transaction is confirmed
    async fn is_confirmed(&self, transaction_id: &str) -> AnchorResult<bool>;
}

/// Hex encoding for payload bytes in serialized form
mod serde_bytes_base16 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(&text).map_err(serde::de::Error::custom)
    }
}
