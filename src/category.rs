//! Error category tags used to decide which failures are retried.
//!
//! Retry eligibility is a matter of set membership: a failure is retried
//! when its [`ErrorCategory`] is in the configured set. Callers tag their own
//! error types by implementing [`Categorize`].

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Open set of failure categories, identified by a short string tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCategory(Cow<'static, str>);

impl ErrorCategory {
    /// The shared counter store could not be reached.
    pub const STORE_UNAVAILABLE: ErrorCategory = ErrorCategory::from_static("store_unavailable");
    /// A retry budget was exhausted further down a composed chain.
    pub const RETRY_LIMIT_REACHED: ErrorCategory =
        ErrorCategory::from_static("retry_limit_reached");
    pub const CONFIGURATION: ErrorCategory = ErrorCategory::from_static("configuration");
    pub const TIMEOUT: ErrorCategory = ErrorCategory::from_static("timeout");
    pub const TRANSIENT: ErrorCategory = ErrorCategory::from_static("transient");

    pub const fn from_static(tag: &'static str) -> Self {
        ErrorCategory(Cow::Borrowed(tag))
    }

    pub fn new(tag: impl Into<String>) -> Self {
        ErrorCategory(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for ErrorCategory {
    fn from(tag: &'static str) -> Self {
        ErrorCategory::from_static(tag)
    }
}

impl From<String> for ErrorCategory {
    fn from(tag: String) -> Self {
        ErrorCategory::new(tag)
    }
}

/// Maps an error value onto its category tag.
pub trait Categorize {
    fn category(&self) -> ErrorCategory;
}

impl Categorize for std::io::Error {
    fn category(&self) -> ErrorCategory {
        use std::io::ErrorKind;

        match self.kind() {
            ErrorKind::TimedOut => ErrorCategory::TIMEOUT,
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock => ErrorCategory::TRANSIENT,
            _ => ErrorCategory::from_static("io"),
        }
    }
}

impl Categorize for tokio::time::error::Elapsed {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::TIMEOUT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_static_and_owned_tags_compare_equal() {
        assert_eq!(ErrorCategory::new("timeout"), ErrorCategory::TIMEOUT);

        let set: HashSet<ErrorCategory> = [ErrorCategory::TIMEOUT].into_iter().collect();
        assert!(set.contains(&ErrorCategory::new(String::from("timeout"))));
    }

    #[test]
    fn test_io_error_categories() {
        let timed_out = std::io::Error::from(std::io::ErrorKind::TimedOut);
        let refused = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        let missing = std::io::Error::from(std::io::ErrorKind::NotFound);

        assert_eq!(timed_out.category(), ErrorCategory::TIMEOUT);
        assert_eq!(refused.category(), ErrorCategory::TRANSIENT);
        assert_eq!(missing.category().as_str(), "io");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&ErrorCategory::STORE_UNAVAILABLE).unwrap();
        assert_eq!(json, "\"store_unavailable\"");

        let parsed: ErrorCategory = serde_json::from_str("\"transient\"").unwrap();
        assert_eq!(parsed, ErrorCategory::TRANSIENT);
    }
}
