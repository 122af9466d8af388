/// Asset model
use crate::did::TrustLayer;
use crate::error::{AnchorError, AnchorResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A content resource carried by an asset
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetResource {
    pub id: String,
    pub content_type: String,
    /// Lowercase hex SHA-256 of the content
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Raw bytes, kept in memory only; the hash is the durable reference
    #[serde(skip)]
    pub content: Option<Vec<u8>>,
}

impl AssetResource {
    /// Build a resource from raw content, computing hash and size
    pub fn from_content(id: impl Into<String>, content_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            content_type: content_type.into(),
            hash: hex::encode(Sha256::digest(&content)),
            size: Some(content.len() as u64),
            content: Some(content),
        }
    }

    /// Verify the declared hash against the in-memory content, when present
    pub fn verify_integrity(&self) -> AnchorResult<()> {
        if let Some(content) = &self.content {
            let computed = hex::encode(Sha256::digest(content));
            if computed != self.hash {
                return Err(AnchorError::Validation(format!(
                    "resource {} content does not match its declared hash",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// One completed migration in an asset's history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    pub from_layer: TrustLayer,
    pub to_layer: TrustLayer,
    pub timestamp: DateTime<Utc>,
    pub transaction_ids: Vec<String>,
    /// Identifier minted by an anchored-layer migration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
}

/// An asset whose authoritative state is anchored on some trust layer.
///
/// Owned by the caller; the migration engine mutates only `layer` and
/// `migration_history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub layer: TrustLayer,
    pub resources: Vec<AssetResource>,
    #[serde(default)]
    pub migration_history: Vec<MigrationRecord>,
}

impl Asset {
    /// New local-layer asset with a generated id
    pub fn new(resources: Vec<AssetResource>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            layer: TrustLayer::Local,
            resources,
            migration_history: Vec::new(),
        }
    }

    /// The manifest that gets anchored: asset id plus resource descriptors,
    /// without the raw content bytes
    pub fn manifest(&self) -> serde_json::Value {
        serde_json::json!({
            "assetId": self.id,
            "resources": self.resources.iter().map(|r| {
                serde_json::json!({
                    "id": r.id,
                    "contentType": r.content_type,
                    "hash": r.hash,
                    "size": r.size,
                })
            }).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_content_computes_hash_and_size() {
        let resource = AssetResource::from_content("r1", "text/plain", b"hello".to_vec());
        assert_eq!(
            resource.hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(resource.size, Some(5));
        resource.verify_integrity().unwrap();
    }

    #[test]
    fn test_tampered_content_fails_integrity() {
        let mut resource = AssetResource::from_content("r1", "text/plain", b"hello".to_vec());
        resource.content = Some(b"hell0".to_vec());
        assert!(resource.verify_integrity().is_err());
    }

    #[test]
    fn test_hash_only_resource_passes_integrity() {
        let resource = AssetResource {
            id: "r1".to_string(),
            content_type: "image/png".to_string(),
            hash: "ab".repeat(32),
            size: None,
            content: None,
        };
        resource.verify_integrity().unwrap();
    }

    #[test]
    fn test_manifest_omits_content() {
        let asset = Asset::new(vec![AssetResource::from_content(
            "r1",
            "text/plain",
            b"hello".to_vec(),
        )]);
        let manifest = asset.manifest();
        assert_eq!(manifest["assetId"], asset.id.as_str());
        assert_eq!(manifest["resources"][0]["id"], "r1");
        assert!(manifest["resources"][0].get("content").is_none());
    }

    #[test]
    fn test_new_assets_start_local() {
        let asset = Asset::new(Vec::new());
        assert_eq!(asset.layer, TrustLayer::Local);
        assert!(asset.migration_history.is_empty());
    }
}
