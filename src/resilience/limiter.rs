/// Concurrency limiting for provider calls
use crate::resilience::env_parse;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum operations in flight at once
    pub max_concurrent: usize,
    /// Optional minimum spacing between successive admissions, for external
    /// quotas measured in requests per interval
    pub min_interval: Option<Duration>,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            min_interval: None,
        }
    }
}

impl RateLimiterConfig {
    /// Load from environment variables (a zero interval disables pacing)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let interval_ms: u64 = env_parse("LIMITER_MIN_INTERVAL_MS", 0);
        Self {
            max_concurrent: env_parse("LIMITER_MAX_CONCURRENT", defaults.max_concurrent),
            min_interval: (interval_ms > 0).then(|| Duration::from_millis(interval_ms)),
        }
    }
}

/// Bounds concurrent in-flight calls to an external provider.
///
/// Waiters queue FIFO until a slot frees; there is no timeout on the queue
/// wait itself, only on the wrapped operation if the caller supplies one.
#[derive(Clone)]
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    pacer: Option<Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let pacer = config.min_interval.and_then(|interval| {
            Quota::with_period(interval)
                .map(|quota| Arc::new(GovernorLimiter::direct(quota.allow_burst(NonZeroU32::new(1).expect("1 is non-zero")))))
        });

        Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            pacer,
        }
    }

    /// Wait for a slot (and pacing quota), returning a permit that releases
    /// the slot when dropped
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("limiter semaphore is never closed");
        if let Some(pacer) = &self.pacer {
            pacer.until_ready().await;
        }
        permit
    }

    /// Run an operation inside a slot
    pub async fn run<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _permit = self.acquire().await;
        operation().await
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[tokio::test]
    async fn test_bounds_concurrency() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_concurrent: 2,
            min_interval: None,
        });

        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = limiter.clone();
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                limiter
                    .run(|| async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_min_interval_paces_admissions() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_concurrent: 4,
            min_interval: Some(Duration::from_millis(20)),
        });

        let start = Instant::now();
        for _ in 0..3 {
            limiter.run(|| async {}).await;
        }

        // First admission is free; the next two wait an interval each
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_concurrent: 1,
            min_interval: None,
        });

        {
            let _permit = limiter.acquire().await;
            assert_eq!(limiter.available(), 0);
        }
        assert_eq!(limiter.available(), 1);
    }
}
