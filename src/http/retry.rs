//! Bounded, immediate re-issue of requests that timed out.

use async_trait::async_trait;
use log::{debug, warn};

use super::client::Transport;
use super::request::{Request, Response};
use crate::error::Error;

/// Default number of attempts before a timing-out request is abandoned.
pub const DEFAULT_TIMEOUT_RETRIES: u32 = 3;

/// Re-sends the same request while the layer below reports [`Error::Timeout`].
///
/// Every other outcome, including HTTP error responses and non-timeout
/// failures, is returned unchanged on the first attempt that produces it.
/// There is no delay between attempts.
pub struct TimeoutRetry<T> {
    inner: T,
    max_attempts: u32,
}

impl<T: Transport> TimeoutRetry<T> {
    /// A ceiling of zero is treated as one attempt.
    pub fn new(inner: T, max_attempts: u32) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for TimeoutRetry<T> {
    async fn execute(&self, request: &Request) -> Result<Response, Error> {
        let mut timeouts = 0;

        loop {
            match self.inner.execute(request).await {
                Err(e) if e.is_timeout() => {
                    timeouts += 1;
                    debug!(
                        "The request to \"{}\" timed out after {} tries.",
                        request.url, timeouts
                    );

                    if timeouts >= self.max_attempts {
                        warn!(
                            "Maximum retries ({}) hit for \"{}\"",
                            self.max_attempts, request.url
                        );
                        return Err(Error::RequestTimeoutExceeded {
                            url: request.url.clone(),
                            attempts: timeouts,
                        });
                    }
                }
                other => return other,
            }
        }
    }
}
