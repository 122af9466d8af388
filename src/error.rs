/// Unified error types for the anchoring library
use thiserror::Error;

/// Main error type for anchoring, resolution, and migration operations
#[derive(Error, Debug)]
pub enum AnchorError {
    /// Validation errors (malformed DIDs, illegal layer transitions)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Provider errors (ordinals indexer, inscription service)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Storage adapter errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Migration errors
    #[error("Migration error: {0}")]
    Migration(String),

    /// Post-anchoring verification mismatch
    #[error("Verification failed: {0}")]
    Verification(String),

    /// The circuit breaker rejected the call without invoking the operation
    #[error("Circuit open: {0}")]
    CircuitOpen(String),

    /// Retry budget exhausted (only produced when the caller asked for
    /// wrapped errors, or when the budget was zero to begin with)
    #[error("Operation failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<AnchorError>,
    },

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP errors from provider fetches
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for anchoring operations
pub type AnchorResult<T> = Result<T, AnchorError>;

/// Message fragments that mark an error as transient
const TRANSIENT_MARKERS: &[&str] = &[
    "rate limit",
    "too many requests",
    "quota exceeded",
    "timeout",
    "timed out",
    "network",
    "unavailable",
    "connection reset",
    "dns",
];

impl AnchorError {
    /// Default transient classification used by the retry executor.
    ///
    /// Validation, not-found, and verification errors are never retriable.
    /// An open circuit is never retriable either: the breaker exists to stop
    /// traffic, and a retry loop must respect that.
    pub fn is_transient(&self) -> bool {
        match self {
            AnchorError::Validation(_)
            | AnchorError::NotFound(_)
            | AnchorError::Verification(_)
            | AnchorError::Serialization(_)
            | AnchorError::CircuitOpen(_) => false,
            AnchorError::RetriesExhausted { source, .. } => source.is_transient(),
            AnchorError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            AnchorError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::Interrupted
            ),
            other => {
                let message = other.to_string().to_lowercase();
                TRANSIENT_MARKERS.iter().any(|m| message.contains(m))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_by_message() {
        assert!(AnchorError::Provider("rate limit exceeded (429)".to_string()).is_transient());
        assert!(AnchorError::Provider("service unavailable (503)".to_string()).is_transient());
        assert!(AnchorError::Provider("request timed out".to_string()).is_transient());
        assert!(AnchorError::Storage("network partition".to_string()).is_transient());
        assert!(AnchorError::Internal("quota exceeded for key".to_string()).is_transient());
    }

    #[test]
    fn test_permanent_errors_not_transient() {
        assert!(!AnchorError::Validation("bad did".to_string()).is_transient());
        assert!(!AnchorError::NotFound("sat 42".to_string()).is_transient());
        assert!(!AnchorError::Verification("document mismatch".to_string()).is_transient());
        assert!(!AnchorError::Provider("inscription reveal rejected".to_string()).is_transient());
    }

    #[test]
    fn test_circuit_open_never_transient() {
        // Even though the message mentions a timeout, an open circuit must
        // stop the retry loop.
        assert!(!AnchorError::CircuitOpen("cooling down after timeout".to_string()).is_transient());
    }

    #[test]
    fn test_wrapped_error_classifies_by_cause() {
        let wrapped = AnchorError::RetriesExhausted {
            attempts: 3,
            source: Box::new(AnchorError::Provider("rate limit".to_string())),
        };
        assert!(wrapped.is_transient());
    }
}
