//! Rate limiting algorithms module
//!
//! The sliding window decision logic and the store seam it runs behind.
//! A [`WindowStore`] executes one evaluation atomically: pruning, counting
//! and recording happen in a single indivisible step, server-side for
//! Redis and under one lock for the in-process store.

pub mod sliding_window;

use crate::error::LimiterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use sliding_window::{window_millis, SlidingWindow, MAX_WINDOW, SLIDING_WINDOW_SCRIPT};

/// Outcome of one window evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    pub admitted: bool,
    /// Milliseconds until the oldest entry leaves the window; 0 when admitted
    pub retry_after_ms: u64,
    /// Entries in the window after this evaluation
    pub count: u64,
}

impl Admission {
    pub fn admitted(count: u64) -> Self {
        Self {
            admitted: true,
            retry_after_ms: 0,
            count,
        }
    }

    pub fn denied(retry_after_ms: u64, count: u64) -> Self {
        Self {
            admitted: false,
            retry_after_ms,
            count,
        }
    }

    pub fn retry_after(&self) -> Duration {
        Duration::from_millis(self.retry_after_ms)
    }
}

/// Shared counter store holding the window state of every rate key.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Prune, count and conditionally record `now_ms` for `key`, atomically.
    ///
    /// The key's expiry is refreshed to `window` on every recorded entry.
    async fn evaluate_and_record(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        now_ms: u64,
    ) -> Result<Admission, LimiterError>;

    /// Forget every recorded entry for `key`.
    async fn reset(&self, key: &str) -> Result<(), LimiterError>;
}
