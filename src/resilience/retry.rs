/// Retry with exponential backoff
use crate::error::{AnchorError, AnchorResult};
use crate::resilience::env_parse;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Additional attempts after the first failure. An operation with
    /// `max_retries = 3` is invoked at most 4 times. A value of 0 means the
    /// operation is never invoked at all and the call fails with an
    /// exhausted error; best-effort callers must ask for at least one try.
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt
    pub backoff_multiplier: f64,
    /// Fraction of the computed delay to randomize within (0.0 disables)
    pub jitter: f64,
    /// When true, the final error is wrapped as `RetriesExhausted` carrying
    /// the attempt count; when false the last error is returned unchanged.
    pub wrap_errors: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: 0.1,
            wrap_errors: false,
        }
    }
}

impl RetryOptions {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: env_parse("RETRY_MAX_RETRIES", defaults.max_retries),
            initial_delay: Duration::from_millis(env_parse(
                "RETRY_INITIAL_DELAY_MS",
                defaults.initial_delay.as_millis() as u64,
            )),
            max_delay: Duration::from_millis(env_parse(
                "RETRY_MAX_DELAY_MS",
                defaults.max_delay.as_millis() as u64,
            )),
            backoff_multiplier: env_parse("RETRY_BACKOFF_MULTIPLIER", defaults.backoff_multiplier),
            jitter: env_parse("RETRY_JITTER", defaults.jitter),
            wrap_errors: env_parse("RETRY_WRAP_ERRORS", defaults.wrap_errors),
        }
    }

    /// Delay before retry attempt `n` (1-based): min(max, initial * mult^(n-1)),
    /// randomized within the jitter fraction.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jittered = if self.jitter > 0.0 {
            let spread = capped * self.jitter;
            let offset = rand::thread_rng().gen_range(-spread..=spread);
            (capped + offset).max(0.0)
        } else {
            capped
        };

        Duration::from_secs_f64(jittered)
    }
}

/// Executes operations under a retry policy
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    options: RetryOptions,
}

impl RetryExecutor {
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Run an operation, retrying transient failures per the default
    /// classification (`AnchorError::is_transient`).
    pub async fn run<F, Fut, T>(&self, operation: F) -> AnchorResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AnchorResult<T>>,
    {
        self.run_classified(operation, AnchorError::is_transient).await
    }

    /// Run an operation with a caller-supplied retriability predicate.
    ///
    /// A non-retriable error, or exhausting the retry budget, yields the last
    /// error unchanged unless `wrap_errors` is set.
    pub async fn run_classified<F, Fut, T, P>(
        &self,
        mut operation: F,
        retriable: P,
    ) -> AnchorResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AnchorResult<T>>,
        P: Fn(&AnchorError) -> bool,
    {
        if self.options.max_retries == 0 {
            return Err(AnchorError::RetriesExhausted {
                attempts: 0,
                source: Box::new(AnchorError::Internal(
                    "retry budget is zero, operation was never attempted".to_string(),
                )),
            });
        }

        let max_attempts = self.options.max_retries + 1;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt >= max_attempts || !retriable(&e) {
                        if attempt >= max_attempts {
                            warn!("Operation failed after {} attempts: {}", attempt, e);
                        }
                        if self.options.wrap_errors {
                            return Err(AnchorError::RetriesExhausted {
                                attempts: attempt,
                                source: Box::new(e),
                            });
                        }
                        return Err(e);
                    }

                    let delay = self.options.delay_for(attempt);
                    debug!(
                        "Attempt {}/{} failed ({}), retrying in {:?}",
                        attempt, max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_options(max_retries: u32) -> RetryOptions {
        RetryOptions {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: 0.0,
            wrap_errors: false,
        }
    }

    #[tokio::test]
    async fn test_permanent_failure_invokes_max_plus_one_times() {
        let executor = RetryExecutor::new(fast_options(3));
        let calls = Arc::new(AtomicU32::new(0));

        let counted = Arc::clone(&calls);
        let result: AnchorResult<()> = executor
            .run_classified(
                move || {
                    let counted = Arc::clone(&counted);
                    async move {
                        counted.fetch_add(1, Ordering::SeqCst);
                        Err(AnchorError::Provider("rate limit".to_string()))
                    }
                },
                |_| true,
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // Original error is re-raised unchanged, not wrapped
        match result {
            Err(AnchorError::Provider(msg)) => assert_eq!(msg, "rate limit"),
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let executor = RetryExecutor::new(fast_options(3));
        let calls = Arc::new(AtomicU32::new(0));

        let counted = Arc::clone(&calls);
        let result = executor
            .run(move || {
                let counted = Arc::clone(&counted);
                async move {
                    if counted.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(AnchorError::Provider("timeout".to_string()))
                    } else {
                        Ok(42u32)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retriable_error_fails_immediately() {
        let executor = RetryExecutor::new(fast_options(5));
        let calls = Arc::new(AtomicU32::new(0));

        let counted = Arc::clone(&calls);
        let result: AnchorResult<()> = executor
            .run(move || {
                let counted = Arc::clone(&counted);
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Err(AnchorError::Validation("bad did".to_string()))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(AnchorError::Validation(_))));
    }

    #[tokio::test]
    async fn test_zero_retries_never_invokes() {
        let executor = RetryExecutor::new(fast_options(0));
        let calls = Arc::new(AtomicU32::new(0));

        let counted = Arc::clone(&calls);
        let result: AnchorResult<()> = executor
            .run(move || {
                let counted = Arc::clone(&counted);
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        match result {
            Err(AnchorError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 0),
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_wrapped_error_carries_attempt_count_and_cause() {
        let mut options = fast_options(2);
        options.wrap_errors = true;
        let executor = RetryExecutor::new(options);

        let result: AnchorResult<()> = executor
            .run(|| async { Err(AnchorError::Provider("network down".to_string())) })
            .await;

        match result {
            Err(AnchorError::RetriesExhausted { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, AnchorError::Provider(_)));
            }
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }

    #[test]
    fn test_delay_is_capped_at_max() {
        let options = RetryOptions {
            max_retries: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
            backoff_multiplier: 10.0,
            jitter: 0.0,
            wrap_errors: false,
        };

        assert_eq!(options.delay_for(1), Duration::from_millis(100));
        assert_eq!(options.delay_for(2), Duration::from_millis(250));
        assert_eq!(options.delay_for(8), Duration::from_millis(250));
    }

    #[test]
    fn test_jitter_stays_within_fraction() {
        let options = RetryOptions {
            max_retries: 1,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 1.0,
            jitter: 0.5,
            wrap_errors: false,
        };

        for _ in 0..100 {
            let delay = options.delay_for(1).as_secs_f64();
            assert!((0.05..=0.15).contains(&delay), "delay {} out of range", delay);
        }
    }
}
