use crate::algorithms::{window_millis, MAX_WINDOW};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::{Validate, ValidationError};

/// What the limiter does when the shared counter store itself fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Surface the store fault to the caller as "limiter unavailable".
    #[default]
    Closed,
    /// Log the fault and let the call through without a recorded admission.
    Open,
}

/// Configuration for one rate limiter instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RateLimitConfig {
    /// Maximum admissions per window
    #[validate(range(min = 1))]
    pub limit: u64,

    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "validate_window"))]
    pub window: Duration,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Shortest sleep between two probes while waiting for a slot
    #[serde(default = "default_min_poll", with = "humantime_serde")]
    #[validate(custom(function = "validate_min_poll"))]
    pub min_poll: Duration,
}

fn default_min_poll() -> Duration {
    Duration::from_millis(1)
}

fn validate_window(window: &Duration) -> Result<(), ValidationError> {
    if window.as_millis() == 0 {
        return Err(ValidationError::new("window_too_short"));
    }
    if *window > MAX_WINDOW {
        return Err(ValidationError::new("window_too_long"));
    }
    Ok(())
}

fn validate_min_poll(min_poll: &Duration) -> Result<(), ValidationError> {
    if min_poll.is_zero() {
        return Err(ValidationError::new("min_poll_zero"));
    }
    Ok(())
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(1, Duration::from_secs(1))
    }
}

impl RateLimitConfig {
    pub fn new(limit: u64, window: Duration) -> Self {
        Self {
            limit,
            window,
            failure_policy: FailurePolicy::default(),
            min_poll: default_min_poll(),
        }
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn with_min_poll(mut self, min_poll: Duration) -> Self {
        self.min_poll = min_poll;
        self
    }

    pub fn window_ms(&self) -> u64 {
        window_millis(self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_with_humantime_window() {
        let config: RateLimitConfig = serde_json::from_value(json!({
            "limit": 30,
            "window": "10s",
            "failure_policy": "open"
        }))
        .unwrap();

        assert_eq!(config.limit, 30);
        assert_eq!(config.window, Duration::from_secs(10));
        assert_eq!(config.failure_policy, FailurePolicy::Open);
        assert_eq!(config.min_poll, Duration::from_millis(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_limit_and_window() {
        assert!(RateLimitConfig::new(0, Duration::from_secs(1)).validate().is_err());
        assert!(RateLimitConfig::new(1, Duration::ZERO).validate().is_err());
        assert!(RateLimitConfig::new(1, Duration::from_micros(10)).validate().is_err());
    }

    #[test]
    fn test_rejects_window_beyond_maximum() {
        assert!(RateLimitConfig::new(1, MAX_WINDOW).validate().is_ok());
        assert!(RateLimitConfig::new(1, MAX_WINDOW + Duration::from_millis(1)).validate().is_err());
        assert!(RateLimitConfig::new(1, Duration::from_secs(u64::MAX / 1000))
            .validate()
            .is_err());
    }

    #[test]
    fn test_fail_closed_by_default() {
        let config = RateLimitConfig::new(5, Duration::from_secs(1));
        assert_eq!(config.failure_policy, FailurePolicy::Closed);
    }
}
