//! Settings consumed by the client. Nothing here is read from disk.

use std::fmt;
use std::time::Duration;

use crate::auth::{Credentials, mask};
use crate::http::DEFAULT_TIMEOUT_RETRIES;

pub const DEFAULT_API_BASE: &str = "https://api.planningcenteronline.com";
pub const DEFAULT_UPLOAD_URL: &str = "https://upload.planningcenteronline.com/v2/files";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL prefixed to relative request URLs.
    pub api_base: String,
    /// Per-attempt timeout for ordinary requests.
    pub timeout: Duration,
    /// Fixed endpoint for file uploads, used verbatim.
    pub upload_url: String,
    /// Per-attempt timeout for uploads.
    pub upload_timeout: Duration,
    /// Attempts before a timing-out request fails.
    pub timeout_retries: u32,
    /// Full `Authorization` header value; empty means none is sent.
    pub auth_header: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            upload_url: DEFAULT_UPLOAD_URL.to_string(),
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            timeout_retries: DEFAULT_TIMEOUT_RETRIES,
            auth_header: String::new(),
        }
    }
}

impl ClientConfig {
    pub fn with_credentials(mut self, credentials: &Credentials) -> Self {
        self.auth_header = credentials.auth_header();
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .field("upload_url", &self.upload_url)
            .field("upload_timeout", &self.upload_timeout)
            .field("timeout_retries", &self.timeout_retries)
            .field("auth_header", &mask(&self.auth_header))
            .finish()
    }
}
