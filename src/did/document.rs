/// DID Document model
use serde::{Deserialize, Serialize};

/// Default JSON-LD context for anchored DID documents
pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

/// A DID document resolved from on-chain inscription metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    #[serde(rename = "@context", default = "default_context")]
    pub context: Vec<String>,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<Vec<VerificationMethod>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_method: Option<Vec<serde_json::Value>>,
}

fn default_context() -> Vec<String> {
    vec![DID_CONTEXT.to_string()]
}

impl DidDocument {
    /// Minimal document for an identifier: context plus id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            context: default_context(),
            id: id.into(),
            verification_method: None,
            authentication: None,
            assertion_method: None,
        }
    }
}

/// A verification method entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub controller: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,
}
