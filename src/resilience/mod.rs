/// Resilience Layer
///
/// Retry-with-backoff, circuit breaking, and concurrency limiting for calls
/// to external providers. Every provider and storage call made by the
/// resolver and the migration engine goes through these primitives.

pub mod breaker;
pub mod limiter;
pub mod retry;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use limiter::{RateLimiter, RateLimiterConfig};
pub use retry::{RetryExecutor, RetryOptions};

/// Aggregate resilience configuration
#[derive(Debug, Clone, Default)]
pub struct ResilienceConfig {
    pub retry: RetryOptions,
    pub breaker: CircuitBreakerConfig,
    pub limiter: RateLimiterConfig,
}

impl ResilienceConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        Self {
            retry: RetryOptions::from_env(),
            breaker: CircuitBreakerConfig::from_env(),
            limiter: RateLimiterConfig::from_env(),
        }
    }
}

/// Parse an environment variable, falling back to a default
pub(crate) fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
