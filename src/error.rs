use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

use crate::category::{Categorize, ErrorCategory};

/// Failures of the limiter itself, as opposed to failures of the wrapped call.
#[derive(Debug, Error)]
pub enum LimiterError {
    /// The shared counter store could not be reached or rejected the script
    #[error("Limiter unavailable: {0}")]
    Store(#[from] redis::RedisError),

    /// The store answered, but not with the reply the window script produces
    #[error("Unexpected store reply: {0}")]
    Protocol(String),

    #[error("Internal limiter error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, LimiterError>;

impl From<validator::ValidationErrors> for LimiterError {
    fn from(err: validator::ValidationErrors) -> Self {
        LimiterError::Validation(err.to_string())
    }
}

impl From<envconfig::Error> for LimiterError {
    fn from(err: envconfig::Error) -> Self {
        LimiterError::Configuration(err.to_string())
    }
}

impl LimiterError {
    /// True for faults of the store round trip rather than of the caller's input.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            LimiterError::Store(_) | LimiterError::Protocol(_) | LimiterError::Internal(_)
        )
    }
}

impl Categorize for LimiterError {
    fn category(&self) -> ErrorCategory {
        if self.is_unavailable() {
            ErrorCategory::STORE_UNAVAILABLE
        } else {
            ErrorCategory::CONFIGURATION
        }
    }
}

/// Error returned by a rate-limited callable.
///
/// Exceeding the limit never produces an error: the call is suspended
/// instead. The only failures are the limiter being unavailable (under
/// [`FailurePolicy::Closed`](crate::FailurePolicy::Closed)) and whatever the
/// wrapped callable itself returned.
#[derive(Debug)]
pub enum RateLimitError<E> {
    Unavailable(LimiterError),
    Inner(E),
}

impl<E> RateLimitError<E> {
    /// Returns the wrapped callable's own error, if that is what this is.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RateLimitError::Inner(err) => Some(err),
            RateLimitError::Unavailable(_) => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, RateLimitError::Unavailable(_))
    }
}

impl<E> From<LimiterError> for RateLimitError<E> {
    fn from(err: LimiterError) -> Self {
        RateLimitError::Unavailable(err)
    }
}

impl<E: fmt::Display> fmt::Display for RateLimitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::Unavailable(err) => write!(f, "{}", err),
            RateLimitError::Inner(err) => write!(f, "{}", err),
        }
    }
}

impl<E: StdError + 'static> StdError for RateLimitError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            RateLimitError::Unavailable(err) => Some(err),
            RateLimitError::Inner(err) => Some(err),
        }
    }
}

impl<E: Categorize> Categorize for RateLimitError<E> {
    fn category(&self) -> ErrorCategory {
        match self {
            RateLimitError::Unavailable(err) => err.category(),
            RateLimitError::Inner(err) => err.category(),
        }
    }
}

/// Error returned by a callable wrapped in [`Retry`](crate::Retry).
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error. `source` is the last one.
    LimitReached { attempts: u32, source: E },
    /// A failure outside the retryable set, passed through untouched.
    Failed(E),
}

impl<E> RetryError<E> {
    /// Unwraps the underlying failure, discarding the retry bookkeeping.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::LimitReached { source, .. } => source,
            RetryError::Failed(err) => err,
        }
    }

    pub fn inner(&self) -> &E {
        match self {
            RetryError::LimitReached { source, .. } => source,
            RetryError::Failed(err) => err,
        }
    }

    pub fn is_limit_reached(&self) -> bool {
        matches!(self, RetryError::LimitReached { .. })
    }

    /// Number of attempts made before giving up, when the budget ran out.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            RetryError::LimitReached { attempts, .. } => Some(*attempts),
            RetryError::Failed(_) => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::LimitReached { attempts, source } => {
                write!(f, "Retry limit reached after {} attempts: {}", attempts, source)
            }
            RetryError::Failed(err) => write!(f, "{}", err),
        }
    }
}

impl<E: StdError + 'static> StdError for RetryError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            RetryError::LimitReached { source, .. } => Some(source),
            RetryError::Failed(err) => err.source(),
        }
    }
}

impl<E: Categorize> Categorize for RetryError<E> {
    fn category(&self) -> ErrorCategory {
        match self {
            RetryError::LimitReached { .. } => ErrorCategory::RETRY_LIMIT_REACHED,
            RetryError::Failed(err) => err.category(),
        }
    }
}
