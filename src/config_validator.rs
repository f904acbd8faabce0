use crate::error::LimiterError;
use crate::rate_limit_config::RateLimitConfig;
use crate::retry_config::RetryConfig;
use validator::Validate;

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates a Redis URL
    pub fn validate_redis_url(url: &str) -> Result<(), LimiterError> {
        if url.is_empty() {
            return Err(LimiterError::Validation(
                "Redis URL cannot be empty".to_string(),
            ));
        }

        if !url.starts_with("redis://")
            && !url.starts_with("rediss://")
            && !url.starts_with("redis+unix://")
            && !url.starts_with("unix://")
        {
            return Err(LimiterError::Validation(
                "Redis URL must start with 'redis://', 'rediss://' or a unix socket scheme"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Validates rate limit parameters
    pub fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), LimiterError> {
        config.validate()?;
        Ok(())
    }

    /// Validates retry parameters
    pub fn validate_retry_config(config: &RetryConfig) -> Result<(), LimiterError> {
        if !config.backoff_factor.is_finite() {
            return Err(LimiterError::Validation(
                "Backoff factor must be a finite number".to_string(),
            ));
        }

        config.validate()?;

        if let Some(max_backoff) = config.max_backoff {
            if max_backoff.as_millis() < config.backoff_ms as u128 {
                return Err(LimiterError::Validation(format!(
                    "Max backoff ({}ms) is shorter than the initial backoff ({}ms)",
                    max_backoff.as_millis(),
                    config.backoff_ms
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_validate_redis_url() {
        assert!(ConfigValidator::validate_redis_url("redis://localhost:6379").is_ok());
        assert!(ConfigValidator::validate_redis_url("rediss://cache.internal:6380/2").is_ok());
        assert!(ConfigValidator::validate_redis_url("").is_err());
        assert!(ConfigValidator::validate_redis_url("http://localhost").is_err());
    }

    #[test]
    fn test_validate_rate_limit_config() {
        let valid = RateLimitConfig::new(10, Duration::from_secs(1));
        assert!(ConfigValidator::validate_rate_limit_config(&valid).is_ok());

        let zero_limit = RateLimitConfig::new(0, Duration::from_secs(1));
        assert!(matches!(
            ConfigValidator::validate_rate_limit_config(&zero_limit),
            Err(LimiterError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_retry_config() {
        assert!(ConfigValidator::validate_retry_config(&RetryConfig::new(3, 100, 2.0)).is_ok());
        assert!(ConfigValidator::validate_retry_config(&RetryConfig::new(0, 0, 1.0)).is_ok());

        let nan = RetryConfig::new(3, 100, f64::NAN);
        assert!(ConfigValidator::validate_retry_config(&nan).is_err());

        let inverted = RetryConfig::new(3, 100, 2.0).with_max_backoff(Duration::from_millis(50));
        assert!(ConfigValidator::validate_retry_config(&inverted).is_err());
    }
}
