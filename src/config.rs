use crate::config_validator::ConfigValidator;
use crate::error::LimiterError;
use crate::rate_limit_config::{FailurePolicy, RateLimitConfig};
use crate::retry_config::RetryConfig;
use envconfig::Envconfig;
use std::time::Duration;

#[derive(Debug, Envconfig, Clone)]
pub struct Settings {
    /// Redis connection URL
    #[envconfig(from = "REDIS_URL", default = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Namespace prepended to every window key
    #[envconfig(from = "RATE_LIMIT_KEY_PREFIX", default = "rate_limiter:")]
    pub key_prefix: String,

    /// Admissions per window
    #[envconfig(from = "RATE_LIMIT", default = "100")]
    pub rate_limit: u64,

    #[envconfig(from = "RATE_LIMIT_WINDOW_MS", default = "1000")]
    pub window_ms: u64,

    /// Admit calls when Redis is unreachable instead of failing them
    #[envconfig(from = "RATE_LIMIT_FAIL_OPEN", default = "false")]
    pub fail_open: bool,

    #[envconfig(from = "RETRIES", default = "3")]
    pub retries: u32,

    #[envconfig(from = "RETRY_BACKOFF_MS", default = "10")]
    pub backoff_ms: u64,

    #[envconfig(from = "RETRY_BACKOFF_FACTOR", default = "1.0")]
    pub backoff_factor: f64,

    #[envconfig(from = "RETRY_MAX_BACKOFF_MS")]
    pub max_backoff_ms: Option<u64>,
}

impl Settings {
    /// Load settings from the environment, reading a `.env` file first if present.
    pub fn from_env() -> Result<Self, LimiterError> {
        dotenv::dotenv().ok();
        let settings = Settings::init_from_env()?;
        ConfigValidator::validate_redis_url(&settings.redis_url)?;
        Ok(settings)
    }

    /// Validated rate limit configuration described by these settings.
    pub fn rate_limit_config(&self) -> Result<RateLimitConfig, LimiterError> {
        let failure_policy = if self.fail_open {
            FailurePolicy::Open
        } else {
            FailurePolicy::Closed
        };
        let config = RateLimitConfig::new(self.rate_limit, Duration::from_millis(self.window_ms))
            .with_failure_policy(failure_policy);

        ConfigValidator::validate_rate_limit_config(&config)?;
        Ok(config)
    }

    /// Validated retry configuration. Categories to retry on are code-level
    /// knowledge and are added by the caller.
    pub fn retry_config(&self) -> Result<RetryConfig, LimiterError> {
        let mut config = RetryConfig::new(self.retries, self.backoff_ms, self.backoff_factor);
        if let Some(max_backoff_ms) = self.max_backoff_ms {
            config = config.with_max_backoff(Duration::from_millis(max_backoff_ms));
        }

        ConfigValidator::validate_retry_config(&config)?;
        Ok(config)
    }
}
