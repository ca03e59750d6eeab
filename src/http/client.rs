//! Raw transport: one network exchange per call, no retries.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use super::request::{Request, Response};
use crate::error::Error;

/// A single call contract shared by the transport and every policy layer
/// stacked on top of it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &Request) -> Result<Response, Error>;
}

/// reqwest-backed transport. Cloning shares the connection pool.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
    upload_timeout: Duration,
}

impl HttpClient {
    /// Creates a transport over the given reqwest Client.
    pub fn new(client: Client, timeout: Duration, upload_timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            upload_timeout,
        }
    }

    /// Returns a reference to the underlying reqwest Client.
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpClient {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: &Request) -> Result<Response, Error> {
        let timeout = if request.is_upload() {
            self.upload_timeout
        } else {
            self.timeout
        };

        debug!(
            "Executing {} request to '{}' with params {:?}, timeout {:?}",
            request.method, request.url, request.params, timeout
        );

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .query(&request.params)
            .timeout(timeout);

        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }

        if let Some(path) = &request.upload {
            builder = builder.multipart(upload_form(path).await?);
        }

        let response = builder.send().await?;
        Response::read(response).await
    }
}

/// Reads the upload into a multipart form. The file handle lives only
/// inside this function, so it is closed on every return path.
async fn upload_form(path: &Path) -> Result<Form, Error> {
    let io_error = |e: std::io::Error| {
        Error::Network(format!("Failed to read upload file {:?}: {}", path, e))
    };

    let mut file = tokio::fs::File::open(path).await.map_err(io_error)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).await.map_err(io_error)?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());

    debug!("Uploading {} ({} bytes)", file_name, contents.len());

    Ok(Form::new().part("file", Part::bytes(contents).file_name(file_name)))
}
