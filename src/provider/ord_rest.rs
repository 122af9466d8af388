/// Ord REST provider
///
/// Reference `ResourceProvider` backed by an ord-style HTTP server (the
/// `/r/sat`, `/inscription`, `/r/metadata`, and `/content` endpoints).
use crate::error::{AnchorError, AnchorResult};
use crate::provider::{InscriptionInfo, ResourceProvider, SatInfo};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Ord REST provider configuration
#[derive(Debug, Clone)]
pub struct OrdRestConfig {
    /// Base URL of the ord server, without a trailing slash
    pub endpoint: String,
    /// User-Agent header for HTTP requests
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OrdRestConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080".to_string(),
            user_agent: "btco-anchor/0.1".to_string(),
            timeout_secs: 10,
        }
    }
}

impl OrdRestConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("ORD_ENDPOINT")
                .unwrap_or(defaults.endpoint)
                .trim_end_matches('/')
                .to_string(),
            user_agent: std::env::var("ORD_USER_AGENT").unwrap_or(defaults.user_agent),
            timeout_secs: std::env::var("ORD_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// One page of `/r/sat/<SAT>` results
#[derive(Debug, Deserialize)]
struct SatPage {
    ids: Vec<String>,
    more: bool,
}

/// Subset of the `/inscription/<ID>` response we consume
#[derive(Debug, Deserialize)]
struct InscriptionResponse {
    id: String,
    sat: Option<u64>,
    content_type: Option<String>,
}

/// `ResourceProvider` over an ord server's REST API
#[derive(Clone)]
pub struct OrdRestProvider {
    client: reqwest::Client,
    config: OrdRestConfig,
}

impl OrdRestProvider {
    /// Create a new provider
    pub fn new(config: OrdRestConfig) -> AnchorResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnchorError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Content locator for an inscription id
    fn content_url(&self, inscription_id: &str) -> String {
        format!("{}/content/{}", self.config.endpoint, inscription_id)
    }

    /// Map a non-success status to a provider error whose message the default
    /// transient classifier understands
    fn status_error(status: reqwest::StatusCode, url: &str) -> AnchorError {
        match status.as_u16() {
            429 => AnchorError::Provider(format!("rate limit exceeded (429) from {}", url)),
            503 => AnchorError::Provider(format!("service unavailable (503) from {}", url)),
            code => AnchorError::Provider(format!("provider returned {} for {}", code, url)),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> AnchorResult<T> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response.status(), url));
        }

        response
            .json()
            .await
            .map_err(|e| AnchorError::Provider(format!("invalid response from {}: {}", url, e)))
    }
}

#[async_trait]
impl ResourceProvider for OrdRestProvider {
    async fn get_sat_info(&self, sat: u64) -> AnchorResult<SatInfo> {
        let mut inscription_ids = Vec::new();
        let mut page = 0u64;

        loop {
            let url = if page == 0 {
                format!("{}/r/sat/{}", self.config.endpoint, sat)
            } else {
                format!("{}/r/sat/{}/{}", self.config.endpoint, sat, page)
            };

            let result: SatPage = self.get_json(&url).await?;
            inscription_ids.extend(result.ids);

            if !result.more {
                break;
            }
            page += 1;
        }

        debug!("Sat {} carries {} inscription(s)", sat, inscription_ids.len());
        Ok(SatInfo { inscription_ids })
    }

    async fn resolve_inscription(&self, inscription_id: &str) -> AnchorResult<InscriptionInfo> {
        let url = format!("{}/inscription/{}", self.config.endpoint, inscription_id);
        let response: InscriptionResponse = self.get_json(&url).await?;

        let sat = response.sat.ok_or_else(|| {
            AnchorError::Provider(format!(
                "inscription {} has no sat tracking (index built without --index-sats?)",
                inscription_id
            ))
        })?;

        Ok(InscriptionInfo {
            content_url: self.content_url(&response.id),
            id: response.id,
            sat,
            content_type: response.content_type,
        })
    }

    async fn get_metadata(&self, inscription_id: &str) -> AnchorResult<Option<serde_json::Value>> {
        let url = format!("{}/r/metadata/{}", self.config.endpoint, inscription_id);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::status_error(response.status(), &url));
        }

        // The endpoint returns hex-encoded CBOR as a JSON string
        let encoded: String = response
            .json()
            .await
            .map_err(|e| AnchorError::Provider(format!("invalid metadata envelope: {}", e)))?;
        let bytes = hex::decode(&encoded)
            .map_err(|e| AnchorError::Provider(format!("metadata is not valid hex: {}", e)))?;
        let cbor: serde_cbor::Value = serde_cbor::from_slice(&bytes)
            .map_err(|e| AnchorError::Provider(format!("metadata is not valid CBOR: {}", e)))?;
        let value = serde_json::to_value(&cbor)
            .map_err(|e| AnchorError::Provider(format!("metadata is not JSON-compatible: {}", e)))?;

        Ok(Some(value))
    }

    async fn fetch_content(&self, content_url: &str) -> AnchorResult<Vec<u8>> {
        let response = self.client.get(content_url).send().await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response.status(), content_url));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
