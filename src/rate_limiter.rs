//! Sliding window rate limit middleware.
//!
//! Exceeding the limit never fails a call; it suspends it until the window
//! has a free slot. Waiters on the same key are not queued: whichever probe
//! finds a free slot first is admitted, so a waiter can starve under heavy
//! contention.

use crate::algorithms::{Admission, WindowStore};
use crate::clock::{Clock, SystemClock};
use crate::config_validator::ConfigValidator;
use crate::error::{LimiterError, RateLimitError};
use crate::rate_limit_config::{FailurePolicy, RateLimitConfig};
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Future returned by a rate limited function.
pub type LimitedFuture<T, E> = BoxFuture<'static, Result<T, RateLimitError<E>>>;

#[derive(Clone)]
pub struct RateLimit {
    store: Arc<dyn WindowStore>,
    clock: Arc<dyn Clock>,
    config: Arc<RateLimitConfig>,
}

impl RateLimit {
    pub fn new<S>(store: S, config: RateLimitConfig) -> Result<Self, LimiterError>
    where
        S: WindowStore + 'static,
    {
        Self::from_shared(Arc::new(store), config)
    }

    /// Build a limiter on a store shared with other limiters.
    pub fn from_shared(
        store: Arc<dyn WindowStore>,
        config: RateLimitConfig,
    ) -> Result<Self, LimiterError> {
        ConfigValidator::validate_rate_limit_config(&config)?;

        Ok(Self {
            store,
            clock: Arc::new(SystemClock),
            config: Arc::new(config),
        })
    }

    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Run one atomic window evaluation for `key`.
    pub async fn probe(&self, key: &str) -> Result<Admission, LimiterError> {
        let now_ms = self.clock.now_ms();
        let admission = self
            .store
            .evaluate_and_record(key, self.config.limit, self.config.window, now_ms)
            .await?;

        debug!(
            target: "rate_limiter::limiter",
            key = %key,
            count = admission.count,
            allowed = admission.admitted,
            wait_ms = admission.retry_after_ms,
            "Limiter stats"
        );
        Ok(admission)
    }

    /// Single non-blocking check. Returns whether the call was admitted and,
    /// if not, how many milliseconds until a slot frees up.
    pub async fn is_allowed(&self, key: &str) -> Result<(bool, u64), LimiterError> {
        let admission = self.probe(key).await?;
        Ok((admission.admitted, admission.retry_after_ms))
    }

    /// Suspend until `key` has been admitted.
    ///
    /// Sleeps at least the reported wait (and never less than `min_poll`)
    /// between probes. Store faults follow the configured [`FailurePolicy`].
    pub async fn wait_until_allowed(&self, key: &str) -> Result<(), LimiterError> {
        loop {
            let admission = match self.probe(key).await {
                Ok(admission) => admission,
                Err(err) => return self.on_store_failure(key, err),
            };

            if admission.admitted {
                return Ok(());
            }

            let wait = admission.retry_after().max(self.config.min_poll);
            info!(
                target: "rate_limiter::limiter",
                key = %key,
                wait_ms = wait.as_millis() as u64,
                "Rate limited. Waiting before allowing execution"
            );
            tokio::time::sleep(wait).await;
        }
    }

    fn on_store_failure(&self, key: &str, err: LimiterError) -> Result<(), LimiterError> {
        match self.config.failure_policy {
            FailurePolicy::Closed => {
                error!(
                    target: "rate_limiter::limiter",
                    key = %key,
                    error = %err,
                    "Limiter unavailable, failing closed"
                );
                Err(err)
            }
            FailurePolicy::Open => {
                warn!(
                    target: "rate_limiter::limiter",
                    key = %key,
                    error = %err,
                    "Limiter unavailable, failing open"
                );
                Ok(())
            }
        }
    }

    /// Wait for admission on `key`, then run `f` once.
    pub async fn call<F, Fut, T, E>(&self, key: &str, f: F) -> Result<T, RateLimitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.wait_until_allowed(key).await?;
        f().await.map_err(RateLimitError::Inner)
    }

    /// Wrap `f` so that every invocation first waits for admission on `key`.
    pub fn wrap<F, Fut, A, T, E>(
        &self,
        f: F,
        key: impl Into<Arc<str>>,
    ) -> impl Fn(A) -> LimitedFuture<T, E> + Clone + Send + Sync + 'static
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        A: Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let limiter = self.clone();
        let key: Arc<str> = key.into();
        let f = Arc::new(f);

        move |args: A| {
            let limiter = limiter.clone();
            let key = key.clone();
            let f = f.clone();
            async move { limiter.call(&key, move || (*f)(args)).await }.boxed()
        }
    }

    /// Decorator form: `limiter.for_key("user:42").wrap(f)`.
    pub fn for_key(&self, key: impl Into<Arc<str>>) -> KeyedRateLimit {
        KeyedRateLimit {
            limiter: self.clone(),
            key: key.into(),
        }
    }

    /// Forget every admission recorded for `key`.
    pub async fn reset(&self, key: &str) -> Result<(), LimiterError> {
        self.store.reset(key).await
    }
}

/// A [`RateLimit`] bound to one rate key.
#[derive(Clone)]
pub struct KeyedRateLimit {
    limiter: RateLimit,
    key: Arc<str>,
}

impl KeyedRateLimit {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn limiter(&self) -> &RateLimit {
        &self.limiter
    }

    pub fn wrap<F, Fut, A, T, E>(
        &self,
        f: F,
    ) -> impl Fn(A) -> LimitedFuture<T, E> + Clone + Send + Sync + 'static
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        A: Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.limiter.wrap(f, self.key.clone())
    }
}
