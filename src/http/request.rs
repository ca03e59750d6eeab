//! Request descriptor and buffered response types passed between layers.

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Everything needed to issue one call. Layers borrow it; retries re-send
/// the same descriptor, so payload and upload source are never touched.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub payload: Option<Value>,
    pub upload: Option<PathBuf>,
    pub params: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            payload: None,
            upload: None,
            params: Vec::new(),
        }
    }

    pub fn with_payload(mut self, payload: Option<Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_upload(mut self, path: impl AsRef<Path>) -> Self {
        self.upload = Some(path.as_ref().to_path_buf());
        self
    }

    /// Appends query parameters, keeping their order.
    pub fn with_params(mut self, params: &[(&str, &str)]) -> Self {
        self.params.extend(
            params
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    /// A copy of this descriptor aimed at a different URL.
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..self.clone()
        }
    }

    pub fn is_upload(&self) -> bool {
        self.upload.is_some()
    }
}

/// A fully buffered HTTP response. The body is kept as received.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    url: String,
    body: Vec<u8>,
}

impl Response {
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        url: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            status,
            headers,
            url: url.into(),
            body: body.into(),
        }
    }

    /// Drains a reqwest response into memory.
    pub(crate) async fn read(response: reqwest::Response) -> Result<Self, Error> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let body = response.bytes().await?;
        Ok(Self::new(status, headers, url, body.to_vec()))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }

    /// Parses the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|e| {
            Error::UnexpectedRequest(format!(
                "Failed to parse JSON response from {}: {}",
                self.url, e
            ))
        })
    }
}
