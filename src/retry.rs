//! Retry middleware with geometric backoff.
//!
//! Attempt state lives entirely inside one logical call; nothing is shared
//! between calls or processes, even when they use the same key.

use crate::category::Categorize;
use crate::config_validator::ConfigValidator;
use crate::error::{LimiterError, RetryError};
use crate::retry_config::RetryConfig;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Future returned by a retried function.
pub type RetriedFuture<T, E> = BoxFuture<'static, Result<T, RetryError<E>>>;

#[derive(Debug, Clone)]
pub struct Retry {
    config: Arc<RetryConfig>,
}

impl Retry {
    pub fn new(config: RetryConfig) -> Result<Self, LimiterError> {
        ConfigValidator::validate_retry_config(&config)?;

        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `f` until it succeeds, fails with a non-retryable category, or the
    /// retry budget is spent. `key` only labels log events.
    pub async fn call<F, Fut, T, E>(&self, key: &str, mut f: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Categorize,
    {
        let retries = self.config.retries;
        let mut attempt: u32 = 0;

        loop {
            let err = match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            target: "rate_limiter::retry",
                            key = %key,
                            attempts = attempt + 1,
                            "Succeeded after retrying"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let category = err.category();
            if !self.config.should_retry(&category) {
                debug!(
                    target: "rate_limiter::retry",
                    key = %key,
                    category = %category,
                    "Non-retryable failure, propagating"
                );
                return Err(RetryError::Failed(err));
            }

            if attempt >= retries {
                error!(
                    target: "rate_limiter::retry",
                    key = %key,
                    category = %category,
                    attempts = attempt + 1,
                    "All attempts exhausted. Giving up"
                );
                return Err(RetryError::LimitReached {
                    attempts: attempt + 1,
                    source: err,
                });
            }

            let delay = self.config.delay_for(attempt);
            attempt += 1;
            warn!(
                target: "rate_limiter::retry",
                key = %key,
                category = %category,
                attempt = attempt,
                retries = retries,
                delay_ms = delay.as_millis() as u64,
                "Retryable failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Wrap `f` so that every invocation is retried per this configuration.
    /// The arguments are cloned for each attempt.
    pub fn wrap<F, Fut, A, T, E>(
        &self,
        f: F,
        key: impl Into<Arc<str>>,
    ) -> impl Fn(A) -> RetriedFuture<T, E> + Clone + Send + Sync + 'static
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        A: Clone + Send + 'static,
        T: Send + 'static,
        E: Categorize + Send + 'static,
    {
        let retry = self.clone();
        let key: Arc<str> = key.into();
        let f = Arc::new(f);

        move |args: A| {
            let retry = retry.clone();
            let key = key.clone();
            let f = f.clone();
            async move { retry.call(&key, move || (*f)(args.clone())).await }.boxed()
        }
    }

    /// Decorator form: `retry.for_key("sync-job").wrap(f)`.
    pub fn for_key(&self, key: impl Into<Arc<str>>) -> KeyedRetry {
        KeyedRetry {
            retry: self.clone(),
            key: key.into(),
        }
    }
}

/// A [`Retry`] bound to one key for logging.
#[derive(Debug, Clone)]
pub struct KeyedRetry {
    retry: Retry,
    key: Arc<str>,
}

impl KeyedRetry {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn wrap<F, Fut, A, T, E>(
        &self,
        f: F,
    ) -> impl Fn(A) -> RetriedFuture<T, E> + Clone + Send + Sync + 'static
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        A: Clone + Send + 'static,
        T: Send + 'static,
        E: Categorize + Send + 'static,
    {
        self.retry.wrap(f, self.key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::ErrorCategory;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use thiserror::Error;
    use tokio::time::Instant;

    #[derive(Debug, Error)]
    enum JobError {
        #[error("retry me")]
        Flaky,
        #[error("stop immediately")]
        Fatal,
    }

    impl Categorize for JobError {
        fn category(&self) -> ErrorCategory {
            match self {
                JobError::Flaky => ErrorCategory::TRANSIENT,
                JobError::Fatal => ErrorCategory::new("fatal"),
            }
        }
    }

    fn retry(retries: u32, backoff_ms: u64, factor: f64) -> Retry {
        let config =
            RetryConfig::new(retries, backoff_ms, factor).retry_on(ErrorCategory::TRANSIENT);
        Retry::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_success_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let wrapped = retry(3, 100, 1.0).wrap(
            move |_: ()| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, JobError>(42) }
            },
            "test",
        );

        assert_eq!(wrapped(()).await.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let wrapped = retry(3, 50, 1.0).wrap(
            move |_: ()| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(JobError::Flaky)
                    } else {
                        Ok("success")
                    }
                }
            },
            "test",
        );

        assert_eq!(wrapped(()).await.unwrap(), "success");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_after_four_attempts_with_exponential_delays() {
        let attempts_at = Arc::new(std::sync::Mutex::new(Vec::new()));
        let start = Instant::now();
        let log = attempts_at.clone();
        let policy = retry(3, 100, 2.0);

        let result: Result<(), _> = policy
            .call("test", || {
                log.lock().unwrap().push(start.elapsed());
                async { Err(JobError::Flaky) }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_limit_reached());
        assert_eq!(err.attempts(), Some(4));
        assert!(matches!(err.inner(), JobError::Flaky));

        let attempts_at = attempts_at.lock().unwrap();
        assert_eq!(attempts_at.len(), 4);
        let gaps: Vec<u128> = attempts_at
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect();
        for (gap, expected) in gaps.iter().zip([100u128, 200, 400]) {
            assert!(*gap >= expected && *gap < expected + 5, "gap {} expected {}", gap, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_propagates_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let start = Instant::now();

        let wrapped = retry(2, 50, 1.0).wrap(
            move |_: ()| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(JobError::Fatal) }
            },
            "test",
        );

        let err = wrapped(()).await.unwrap_err();
        assert!(matches!(err, RetryError::Failed(JobError::Fatal)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_attempt() {
        let err = retry(0, 10, 1.0)
            .call("once", || async { Err::<(), _>(JobError::Flaky) })
            .await
            .unwrap_err();

        assert_eq!(err.attempts(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_arguments_are_replayed_on_each_attempt() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = seen.clone();
        let wrapped = retry(2, 1, 1.0).for_key("echo").wrap(move |arg: String| {
            log.lock().unwrap().push(arg.clone());
            async move { Err::<String, _>(JobError::Flaky) }
        });

        let _ = wrapped("payload".to_string()).await;
        assert_eq!(*seen.lock().unwrap(), vec!["payload"; 3]);
    }

    #[test]
    fn test_rejects_factor_below_one() {
        assert!(Retry::new(RetryConfig::new(1, 10, 0.5)).is_err());
    }
}
