use anyhow::{Context, Result};
use log::debug;
use std::time::Duration;

use crate::{
    auth::Credentials,
    client::Pco,
    config::{
        ClientConfig, DEFAULT_API_BASE, DEFAULT_TIMEOUT, DEFAULT_UPLOAD_TIMEOUT, DEFAULT_UPLOAD_URL,
    },
    http::DEFAULT_TIMEOUT_RETRIES,
    runtime::Runtime,
};

/// Client settings gathered from the command line. `None` keeps the default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub api_base: Option<String>,
    pub timeout_secs: Option<u64>,
    pub upload_url: Option<String>,
    pub upload_timeout_secs: Option<u64>,
    pub timeout_retries: Option<u32>,
}

impl Settings {
    /// Resolves the settings and credentials into a client configuration.
    pub fn into_config<R: Runtime>(self, runtime: &R) -> Result<ClientConfig> {
        let credentials = Credentials::from_runtime(runtime).context(
            "No usable credentials: set PCO_TOKEN, or PCO_APPLICATION_ID and PCO_SECRET",
        )?;

        let config = ClientConfig {
            api_base: self.api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
            upload_url: self
                .upload_url
                .unwrap_or_else(|| DEFAULT_UPLOAD_URL.to_string()),
            upload_timeout: self
                .upload_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_UPLOAD_TIMEOUT),
            timeout_retries: self.timeout_retries.unwrap_or(DEFAULT_TIMEOUT_RETRIES),
            auth_header: String::new(),
        }
        .with_credentials(&credentials);

        debug!("Resolved client configuration: {:?}", config);
        Ok(config)
    }

    /// Builds a managed client from these settings.
    pub fn build<R: Runtime>(self, runtime: &R) -> Result<Pco> {
        let config = self.into_config(runtime)?;
        Pco::new(config).context("Failed to create API client")
    }
}
