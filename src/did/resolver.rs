/// BTCO DID Resolver
///
/// Replays the inscriptions on an identifier's satoshi as an append-only
/// event log: each inscription, in creation order, either supplies a new
/// document, is rejected with a per-record error, or deactivates the
/// identifier for good. The running document after the full scan is the
/// resolved state.
use crate::did::{BtcoDid, DidDocument};
use crate::error::AnchorResult;
use crate::provider::ResourceProvider;
use crate::resilience::{RetryExecutor, RetryOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stable resolution error codes
pub mod error_codes {
    pub const INVALID_DID: &str = "invalidDid";
    pub const NOT_FOUND: &str = "notFound";
    pub const DEACTIVATED: &str = "deactivated";
    pub const INVALID_DID_DOCUMENT: &str = "invalidDidDocument";
}

/// Audit record for one examined inscription
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InscriptionRecord {
    pub id: String,
    pub did_document: Option<DidDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Metadata about a resolution attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionMetadata {
    pub did: String,
    pub total_inscriptions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a `resolve` call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub did_document: Option<DidDocument>,
    pub resolution_metadata: ResolutionMetadata,
    pub inscriptions: Vec<InscriptionRecord>,
}

impl ResolutionResult {
    fn empty(did: String, error: &str) -> Self {
        Self {
            did_document: None,
            resolution_metadata: ResolutionMetadata {
                did,
                total_inscriptions: 0,
                error: Some(error.to_string()),
            },
            inscriptions: Vec::new(),
        }
    }
}

/// Resolver configuration
#[derive(Debug, Clone, Default)]
pub struct BtcoDidResolverConfig {
    pub retry: RetryOptions,
}

/// Resolves `did:btco` identifiers against an ordinals index
#[derive(Clone)]
pub struct BtcoDidResolver {
    provider: Arc<dyn ResourceProvider>,
    retry: RetryExecutor,
}

impl BtcoDidResolver {
    pub fn new(provider: Arc<dyn ResourceProvider>, config: BtcoDidResolverConfig) -> Self {
        Self {
            provider,
            retry: RetryExecutor::new(config.retry),
        }
    }

    /// Resolve an identifier to its current document.
    ///
    /// Protocol outcomes (`invalidDid`, `notFound`, `deactivated`,
    /// `invalidDidDocument`) are reported inside the result; only provider
    /// failures that survive the retry policy surface as `Err`.
    pub async fn resolve(&self, did: &str) -> AnchorResult<ResolutionResult> {
        let parsed = match BtcoDid::parse(did) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Rejecting malformed identifier {}: {}", did, e);
                return Ok(ResolutionResult::empty(
                    did.to_string(),
                    error_codes::INVALID_DID,
                ));
            }
        };

        let did_string = parsed.did();
        let deactivation_marker = parsed.deactivation_marker();

        let sat_info = self
            .retry
            .run(|| self.provider.get_sat_info(parsed.sat()))
            .await?;

        if sat_info.inscription_ids.is_empty() {
            debug!("Sat {} carries no inscriptions", parsed.sat());
            return Ok(ResolutionResult::empty(did_string, error_codes::NOT_FOUND));
        }

        let mut records = Vec::with_capacity(sat_info.inscription_ids.len());
        let mut current: Option<DidDocument> = None;
        let mut deactivated = false;

        // Oldest first: creation order is authority order
        for inscription_id in &sat_info.inscription_ids {
            let record = self
                .examine(inscription_id, &did_string, &deactivation_marker, &mut deactivated)
                .await?;

            // Later inscriptions override earlier ones, but nothing
            // re-activates a deactivated identifier within this scan
            if deactivated {
                current = None;
            } else if let Some(doc) = &record.did_document {
                current = Some(doc.clone());
            }

            records.push(record);
        }

        let error = if current.is_none() {
            Some(
                if deactivated {
                    error_codes::DEACTIVATED
                } else {
                    error_codes::INVALID_DID_DOCUMENT
                }
                .to_string(),
            )
        } else {
            None
        };

        info!(
            "Resolved {} across {} inscription(s) ({})",
            did_string,
            records.len(),
            if current.is_some() { "active" } else { "no document" }
        );

        Ok(ResolutionResult {
            did_document: current,
            resolution_metadata: ResolutionMetadata {
                did: did_string,
                total_inscriptions: records.len(),
                error,
            },
            inscriptions: records,
        })
    }

    /// Examine a single inscription, producing its audit record
    async fn examine(
        &self,
        inscription_id: &str,
        did_string: &str,
        deactivation_marker: &str,
        deactivated: &mut bool,
    ) -> AnchorResult<InscriptionRecord> {
        let inscription = self
            .retry
            .run(|| self.provider.resolve_inscription(inscription_id))
            .await?;
        let content = self
            .retry
            .run(|| self.provider.fetch_content(&inscription.content_url))
            .await?;
        let text = String::from_utf8_lossy(&content);
        let trimmed = text.trim();

        let mut record = InscriptionRecord {
            id: inscription.id.clone(),
            did_document: None,
            error: None,
        };

        // The content must begin with the canonical marker binding it to
        // this identifier
        if !trimmed.starts_with(did_string) {
            warn!(
                "Inscription {} content is not bound to {}",
                inscription.id, did_string
            );
            record.error = Some(error_codes::INVALID_DID_DOCUMENT.to_string());
        }

        if trimmed.contains(deactivation_marker) {
            // Deactivated as of this inscription. First-detected error wins:
            // an error recorded by the marker check above is kept as-is.
            if record.error.is_none() {
                record.error = Some(error_codes::DEACTIVATED.to_string());
            }
            *deactivated = true;
            info!("{} deactivated by inscription {}", did_string, inscription.id);
            return Ok(record);
        }

        if record.error.is_some() {
            return Ok(record);
        }

        let metadata = self
            .retry
            .run(|| self.provider.get_metadata(inscription_id))
            .await?;

        match metadata {
            Some(value) => match serde_json::from_value::<DidDocument>(value) {
                Ok(doc) if doc.id == did_string => {
                    record.did_document = Some(doc);
                }
                Ok(doc) => {
                    warn!(
                        "Inscription {} document id {} does not match {}",
                        inscription.id, doc.id, did_string
                    );
                    record.error = Some(error_codes::INVALID_DID_DOCUMENT.to_string());
                }
                Err(e) => {
                    warn!("Inscription {} metadata is not a document: {}", inscription.id, e);
                    record.error = Some(error_codes::INVALID_DID_DOCUMENT.to_string());
                }
            },
            None => {
                record.error = Some(error_codes::INVALID_DID_DOCUMENT.to_string());
            }
        }

        Ok(record)
    }
}
