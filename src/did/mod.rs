/// DID Layer Model and Syntax
///
/// Identifiers live on one of three trust layers, each with its own DID
/// method: ephemeral `did:peer` (local), web-verifiable `did:webvh` (hosted),
/// and ordinal-anchored `did:btco` (anchored). Only anchored identifiers are
/// resolvable by this crate; the other two methods are recognized for layer
/// classification and migration validation.

pub mod document;
pub mod resolver;

pub use document::{DidDocument, VerificationMethod};
pub use resolver::{
    error_codes, BtcoDidResolver, BtcoDidResolverConfig, InscriptionRecord, ResolutionMetadata,
    ResolutionResult,
};

use crate::error::{AnchorError, AnchorResult};
use serde::{Deserialize, Serialize};

/// Method prefix for anchored identifiers
pub const BTCO_PREFIX: &str = "did:btco:";

/// Method prefix for local identifiers
pub const PEER_PREFIX: &str = "did:peer:";

/// Method prefix for hosted identifiers
pub const WEBVH_PREFIX: &str = "did:webvh:";

/// Largest valid satoshi ordinal (total supply minus one)
pub const MAX_SAT_NUMBER: u64 = 2_099_999_997_689_999;

/// In-content marker that deactivates an anchored identifier. Must appear
/// immediately after the DID string in the inscription content.
pub const DEACTIVATION_SIGIL: &str = "\u{1F525}";

/// Trust layer of an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLayer {
    /// Ephemeral, private to its creator
    Local,
    /// Published on a web host, verifiable but mutable
    Hosted,
    /// Inscribed on a satoshi, immutable
    Anchored,
}

impl TrustLayer {
    /// Classify a DID string by its method prefix
    pub fn of_did(did: &str) -> Option<TrustLayer> {
        if did.starts_with(PEER_PREFIX) {
            Some(TrustLayer::Local)
        } else if did.starts_with(WEBVH_PREFIX) {
            Some(TrustLayer::Hosted)
        } else if did.starts_with(BTCO_PREFIX) {
            Some(TrustLayer::Anchored)
        } else {
            None
        }
    }

    /// Whether assets on this layer may migrate to `target`.
    ///
    /// Migrations only move toward stronger layers, and the anchored layer is
    /// a terminal sink: once on-chain, an asset never moves again.
    pub fn can_migrate_to(self, target: TrustLayer) -> bool {
        matches!(
            (self, target),
            (TrustLayer::Local, TrustLayer::Hosted)
                | (TrustLayer::Local, TrustLayer::Anchored)
                | (TrustLayer::Hosted, TrustLayer::Anchored)
        )
    }
}

impl std::fmt::Display for TrustLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrustLayer::Local => "local",
            TrustLayer::Hosted => "hosted",
            TrustLayer::Anchored => "anchored",
        };
        write!(f, "{}", name)
    }
}

/// A validated anchored identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BtcoDid {
    sat: u64,
}

impl BtcoDid {
    /// Construct from a satoshi number
    pub fn from_sat(sat: u64) -> AnchorResult<Self> {
        if sat > MAX_SAT_NUMBER {
            return Err(AnchorError::Validation(format!(
                "satoshi {} exceeds the maximum ordinal {}",
                sat, MAX_SAT_NUMBER
            )));
        }
        Ok(Self { sat })
    }

    /// Parse a `did:btco:<sat>` string.
    ///
    /// The syntax is strict: the method prefix followed by decimal digits and
    /// nothing else. Path segments, queries, fragments, and extra components
    /// are rejected; an identifier with a trailing path is never a valid root
    /// identifier.
    pub fn parse(did: &str) -> AnchorResult<Self> {
        let suffix = did
            .strip_prefix(BTCO_PREFIX)
            .ok_or_else(|| AnchorError::Validation(format!("not a did:btco identifier: {}", did)))?;

        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AnchorError::Validation(format!(
                "malformed did:btco identifier: {}",
                did
            )));
        }

        let sat: u64 = suffix.parse().map_err(|_| {
            AnchorError::Validation(format!("satoshi number out of range: {}", did))
        })?;

        Self::from_sat(sat)
    }

    /// The satoshi carrying this identifier's inscriptions
    pub fn sat(&self) -> u64 {
        self.sat
    }

    /// The canonical DID string
    pub fn did(&self) -> String {
        format!("{}{}", BTCO_PREFIX, self.sat)
    }

    /// The deactivation marker for this identifier: the DID immediately
    /// followed by the sigil
    pub fn deactivation_marker(&self) -> String {
        format!("{}{}", self.did(), DEACTIVATION_SIGIL)
    }
}

impl std::fmt::Display for BtcoDid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.did())
    }
}
