use crate::category::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use validator::Validate;

/// Configuration for one retry executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RetryConfig {
    /// Re-invocations allowed after the first attempt
    pub retries: u32,

    /// Delay before the first retry
    pub backoff_ms: u64,

    /// Multiplier applied to the delay for every further retry
    #[validate(range(min = 1.0))]
    pub backoff_factor: f64,

    /// Failure categories that are retried; everything else propagates
    #[serde(default)]
    pub retry_on: HashSet<ErrorCategory>,

    /// Upper bound on any single delay
    #[serde(default, with = "humantime_serde")]
    pub max_backoff: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3, 10, 1.0)
    }
}

impl RetryConfig {
    pub fn new(retries: u32, backoff_ms: u64, backoff_factor: f64) -> Self {
        Self {
            retries,
            backoff_ms,
            backoff_factor,
            retry_on: HashSet::new(),
            max_backoff: None,
        }
    }

    pub fn retry_on(mut self, category: impl Into<ErrorCategory>) -> Self {
        self.retry_on.insert(category.into());
        self
    }

    pub fn retry_on_all<I>(mut self, categories: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ErrorCategory>,
    {
        self.retry_on.extend(categories.into_iter().map(Into::into));
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = Some(max_backoff);
        self
    }

    pub fn should_retry(&self, category: &ErrorCategory) -> bool {
        self.retry_on.contains(category)
    }

    /// Sleep before retry number `attempt + 1`: `backoff_ms * backoff_factor^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let millis = self.backoff_ms as f64 * self.backoff_factor.powi(exponent);
        // `as` saturates, so an overflowing product becomes u64::MAX
        let delay = Duration::from_millis(millis.round() as u64);

        match self.max_backoff {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}
