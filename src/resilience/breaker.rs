/// Circuit breaker for degraded external providers
use crate::error::{AnchorError, AnchorResult};
use crate::resilience::env_parse;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Configuration for the circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures (since the last success) before the circuit opens
    pub failure_threshold: u32,
    /// Consecutive successes required in half-open state to close the circuit
    pub success_threshold: u32,
    /// Cool-down period before a half-open probe is allowed
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            failure_threshold: env_parse("BREAKER_FAILURE_THRESHOLD", defaults.failure_threshold),
            success_threshold: env_parse("BREAKER_SUCCESS_THRESHOLD", defaults.success_threshold),
            recovery_timeout: Duration::from_millis(env_parse(
                "BREAKER_RECOVERY_TIMEOUT_MS",
                defaults.recovery_timeout.as_millis() as u64,
            )),
        }
    }
}

/// Breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Rejecting calls until the cool-down elapses
    Open,
    /// Probing whether the dependency recovered
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    opened_at: Option<Instant>,
}

/// Fail-fast guard around a repeatedly failing dependency.
///
/// Closed → Open after `failure_threshold` consecutive failures; Open →
/// HalfOpen once the cool-down elapses; HalfOpen → Closed after
/// `success_threshold` consecutive successes, and back to Open (with a fresh
/// cool-down) on any half-open failure. While open, calls are rejected with
/// `AnchorError::CircuitOpen` without invoking the operation.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<BreakerInner>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
            })),
        }
    }

    /// Run an operation through the breaker
    pub async fn exec<F, Fut, T>(&self, operation: F) -> AnchorResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AnchorResult<T>>,
    {
        if !self.try_acquire().await {
            return Err(AnchorError::CircuitOpen(format!(
                "rejecting call for up to {:?} after repeated failures",
                self.config.recovery_timeout
            )));
        }

        match operation().await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(e) => {
                self.record_failure().await;
                Err(e)
            }
        }
    }

    /// Current state (transitions Open → HalfOpen are applied lazily on the
    /// next call, so an expired cool-down still reads as Open here)
    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Reset to the closed state, clearing all counters
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.opened_at = None;
    }

    async fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let expired = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);
                if expired {
                    info!("Circuit cool-down elapsed, allowing half-open probe");
                    inner.state = CircuitState::HalfOpen;
                    inner.success_count = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    info!("Circuit closed after successful half-open probes");
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.opened_at = None;
                }
            }
            CircuitState::Open => {
                // Unreachable while calls are blocked; ignore
            }
        }
    }

    async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = inner.failure_count.saturating_add(1);
                if inner.failure_count >= self.config.failure_threshold {
                    warn!(
                        "Circuit opened after {} consecutive failures",
                        inner.failure_count
                    );
                    inner.state = CircuitState::Open;
                    inner.success_count = 0;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                warn!("Circuit re-opened after half-open probe failure");
                inner.state = CircuitState::Open;
                inner.success_count = 0;
                inner.opened_at = Some(Instant::now());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_config(recovery_ms: u64) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            success_threshold: 2,
            recovery_timeout: Duration::from_millis(recovery_ms),
        }
    }

    async fn fail(breaker: &CircuitBreaker) -> AnchorResult<()> {
        breaker
            .exec(|| async { Err(AnchorError::Provider("unavailable".to_string())) })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker) -> AnchorResult<()> {
        breaker.exec(|| async { Ok(()) }).await
    }

    #[tokio::test]
    async fn test_opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new(test_config(10_000));

        for _ in 0..2 {
            let _ = fail(&breaker).await;
            assert_eq!(breaker.state().await, CircuitState::Closed);
        }
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking() {
        let breaker = CircuitBreaker::new(test_config(10_000));
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }

        let calls = AtomicU32::new(0);
        let result = breaker
            .exec(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(AnchorError::CircuitOpen(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_failures() {
        let breaker = CircuitBreaker::new(test_config(10_000));

        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        succeed(&breaker).await.unwrap();
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;

        // Never three in a row since the last success
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_closes_after_success_threshold() {
        let breaker = CircuitBreaker::new(test_config(20));
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }

        tokio::time::sleep(Duration::from_millis(30)).await;

        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);
        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(test_config(20));
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }

        tokio::time::sleep(Duration::from_millis(30)).await;

        // The probe fails: straight back to open with a fresh cool-down
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        let result = succeed(&breaker).await;
        assert!(matches!(result, Err(AnchorError::CircuitOpen(_))));
    }

    #[tokio::test]
    async fn test_reset_closes_circuit() {
        let breaker = CircuitBreaker::new(test_config(10_000));
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        assert_eq!(breaker.state().await, CircuitState::Open);

        breaker.reset().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
        succeed(&breaker).await.unwrap();
    }
}
