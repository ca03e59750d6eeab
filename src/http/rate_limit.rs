//! Transparent recovery from HTTP 429 throttling.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use std::time::Duration;

use super::client::Transport;
use super::request::{Request, Response};
use crate::error::Error;

/// Wait used when a 429 arrives without a usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Sleeps for the server-specified `Retry-After` and re-issues the request
/// every time the layer below answers 429. There is no retry ceiling.
pub struct RateLimiter<T> {
    inner: T,
}

impl<T: Transport> RateLimiter<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

/// Parses `Retry-After` as whole seconds.
pub fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl<T: Transport> Transport for RateLimiter<T> {
    async fn execute(&self, request: &Request) -> Result<Response, Error> {
        loop {
            let response = self.inner.execute(request).await?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            let wait = match retry_after(&response) {
                Some(wait) => wait,
                None => {
                    warn!(
                        "Rate limit response from \"{}\" has no usable Retry-After header",
                        request.url
                    );
                    DEFAULT_RETRY_AFTER
                }
            };

            debug!(
                "Received rate limit response. Will try again after {} sec(s).",
                wait.as_secs()
            );
            tokio::time::sleep(wait).await;
        }
    }
}
