//! Distributed sliding-window rate limiting and retry with backoff for
//! async call sites.
//!
//! [`RateLimit`] admits at most `limit` calls per rate key in any trailing
//! `window`, using state kept in a shared [`WindowStore`] (Redis across
//! processes, [`MemoryStore`] within one). [`Retry`] re-runs failed calls
//! whose [`ErrorCategory`] is in its retry set. Both wrap an async function
//! by key and return a function with the same shape, so they nest:
//!
//! - `retry.wrap(limiter.wrap(f, k), k)`: every attempt takes its own
//!   admission slot, and backoff time counts against the window.
//! - `limiter.wrap(retry.wrap(f, k), k)`: one slot per logical call; the
//!   retries inside it are not rate limited.

pub mod algorithms;
pub mod category;
pub mod clock;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod layer;
pub mod memory;
pub mod rate_limit_config;
pub mod rate_limiter;
pub mod redis;
pub mod retry;
pub mod retry_config;

pub use algorithms::{Admission, SlidingWindow, WindowStore, MAX_WINDOW};
pub use category::{Categorize, ErrorCategory};
pub use clock::{Clock, SystemClock, TokioClock};
pub use config::Settings;
pub use crate::redis::RedisStore;
pub use error::{LimiterError, RateLimitError, Result, RetryError};
pub use layer::{RateLimitLayer, RateLimitService, RetryLayer, RetryService};
pub use memory::MemoryStore;
pub use rate_limit_config::{FailurePolicy, RateLimitConfig};
pub use rate_limiter::{KeyedRateLimit, LimitedFuture, RateLimit};
pub use retry::{KeyedRetry, RetriedFuture, Retry};
pub use retry_config::RetryConfig;
