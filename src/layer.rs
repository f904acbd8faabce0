//! `tower` adapters for the rate limit and retry middlewares.
//!
//! Layer order carries the same meaning as nesting `wrap` calls:
//!
//! ```text
//! ServiceBuilder::new()
//!     .layer(retry.layer("k"))       // outer: retries the whole inner stack
//!     .layer(limiter.layer("k"))     // inner: one admission per attempt
//!     .service(svc)
//! ```
//!
//! Swapping the two layers admits each logical request once and retries
//! inside that single admission.

use crate::category::Categorize;
use crate::error::{RateLimitError, RetryError};
use crate::rate_limiter::RateLimit;
use crate::retry::Retry;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};

impl RateLimit {
    pub fn layer(&self, key: impl Into<Arc<str>>) -> RateLimitLayer {
        RateLimitLayer {
            limiter: self.clone(),
            key: key.into(),
        }
    }
}

impl Retry {
    pub fn layer(&self, key: impl Into<Arc<str>>) -> RetryLayer {
        RetryLayer {
            retry: self.clone(),
            key: key.into(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: RateLimit,
    key: Arc<str>,
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
            key: self.key.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: RateLimit,
    key: Arc<str>,
}

impl<S, Req> Service<Req> for RateLimitService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = RateLimitError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    // Readiness of the inner service is awaited after admission, inside the future
    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let inner = self.inner.clone();
        let limiter = self.limiter.clone();
        let key = self.key.clone();

        async move { limiter.call(&key, move || inner.oneshot(req)).await }.boxed()
    }
}

#[derive(Clone)]
pub struct RetryLayer {
    retry: Retry,
    key: Arc<str>,
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            retry: self.retry.clone(),
            key: self.key.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RetryService<S> {
    inner: S,
    retry: Retry,
    key: Arc<str>,
}

impl<S, Req> Service<Req> for RetryService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Categorize + Send + 'static,
    Req: Clone + Send + 'static,
{
    type Response = S::Response;
    type Error = RetryError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let inner = self.inner.clone();
        let retry = self.retry.clone();
        let key = self.key.clone();

        async move {
            retry
                .call(&key, move || inner.clone().oneshot(req.clone()))
                .await
        }
        .boxed()
    }
}
