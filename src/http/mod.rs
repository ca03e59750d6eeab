//! Layered HTTP request pipeline.
//!
//! Each layer implements [`Transport`] and owns the layer below it:
//!
//! - `client` - one raw network exchange ([`HttpClient`])
//! - `retry` - immediate re-issue on timeouts, bounded ([`TimeoutRetry`])
//! - `rate_limit` - sleep on 429 and re-issue, unbounded ([`RateLimiter`])
//! - `url` - absolute URL and slash cleanup ([`UrlNormalizer`])
//! - `interpret` - final classification into success or [`crate::Error`]

mod client;
mod interpret;
mod rate_limit;
mod request;
mod retry;
mod url;

#[cfg(test)]
pub use client::MockTransport;
pub use client::{HttpClient, Transport};
pub use interpret::{interpret, interpret_json};
pub use rate_limit::{DEFAULT_RETRY_AFTER, RateLimiter, retry_after};
pub use request::{Request, Response};
pub use retry::{DEFAULT_TIMEOUT_RETRIES, TimeoutRetry};
pub use url::{UrlNormalizer, normalize_url};

/// The full managed stack in call order.
pub type ManagedTransport = UrlNormalizer<RateLimiter<TimeoutRetry<HttpClient>>>;
