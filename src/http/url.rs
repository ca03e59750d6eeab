//! URL cleanup applied before every non-upload request.

use async_trait::async_trait;
use log::debug;

use super::client::Transport;
use super::request::{Request, Response};
use crate::error::Error;

/// Makes `url` absolute against `api_base` and collapses duplicate slashes.
///
/// The base is prefixed unless the URL already starts with it. Any run of
/// two or more `/` is reduced to one, except a run directly after `:`, which
/// is reduced to exactly `//` so the scheme separator survives. The query
/// string is left untouched. Applying this twice gives the same result as
/// applying it once.
pub fn normalize_url(url: &str, api_base: &str) -> String {
    let base = collapse_slashes(api_base);

    if url.starts_with(&base) {
        collapse_slashes(url)
    } else {
        collapse_slashes(&format!("{}{}", base, url))
    }
}

fn collapse_slashes(url: &str) -> String {
    let (path, query) = match url.find('?') {
        Some(index) => url.split_at(index),
        None => (url, ""),
    };

    let mut cleaned = String::with_capacity(url.len());
    let mut chars = path.chars().peekable();
    let mut previous = None;

    while let Some(c) = chars.next() {
        if c != '/' {
            cleaned.push(c);
            previous = Some(c);
            continue;
        }

        let mut run = 1;
        while chars.next_if_eq(&'/').is_some() {
            run += 1;
        }

        let keep = if previous == Some(':') { run.min(2) } else { 1 };
        cleaned.extend(std::iter::repeat_n('/', keep));
        previous = Some('/');
    }

    cleaned.push_str(query);
    cleaned
}

/// Rewrites the request URL with [`normalize_url`] before passing it down.
/// Uploads go to their own fixed endpoint and are passed through verbatim.
pub struct UrlNormalizer<T> {
    inner: T,
    api_base: String,
}

impl<T: Transport> UrlNormalizer<T> {
    pub fn new(inner: T, api_base: impl Into<String>) -> Self {
        Self {
            inner,
            api_base: api_base.into(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for UrlNormalizer<T> {
    async fn execute(&self, request: &Request) -> Result<Response, Error> {
        if request.is_upload() {
            return self.inner.execute(request).await;
        }

        debug!("URL cleaning input: \"{}\"", request.url);
        let cleaned = request.with_url(normalize_url(&request.url, &self.api_base));
        debug!("URL cleaning output: \"{}\"", cleaned.url);

        self.inner.execute(&cleaned).await
    }
}
