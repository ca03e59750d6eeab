//! The managed entry point to the API.

use futures_util::Stream;
use log::debug;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use serde_json::{Value, json};
use std::path::Path;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::http::{
    HttpClient, ManagedTransport, RateLimiter, Request, Response, TimeoutRetry, Transport,
    UrlNormalizer, interpret,
};
use crate::iterate::{Paging, Record, paginate};

const USER_AGENT: &str = "pco-rs";

/// A client owning one connection pool and the managed request stack.
///
/// Every call goes through URL cleanup, unbounded 429 handling and bounded
/// timeout retries before being classified. Dropping the client (or calling
/// [`Pco::close`]) releases the pool.
pub struct Pco<T: Transport = ManagedTransport> {
    transport: T,
    upload_url: String,
}

impl Pco {
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        if !config.auth_header.is_empty() {
            let mut auth_value = HeaderValue::from_str(&config.auth_header)
                .map_err(|e| Error::Config(format!("Invalid authorization header: {}", e)))?;
            auth_value.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth_value);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        let transport = UrlNormalizer::new(
            RateLimiter::new(TimeoutRetry::new(
                HttpClient::new(client, config.timeout, config.upload_timeout),
                config.timeout_retries,
            )),
            config.api_base.clone(),
        );

        debug!("Client has been initialized with {:?}", config);

        Ok(Self::with_transport(transport, config.upload_url))
    }

    /// A skeleton payload for creating an object of `object_type`.
    pub fn template(object_type: &str, attributes: Option<Value>) -> Value {
        json!({
            "data": {
                "type": object_type,
                "attributes": attributes.unwrap_or_else(|| json!({})),
            }
        })
    }
}

impl<T: Transport> Pco<T> {
    /// Wraps an arbitrary request stack.
    pub fn with_transport(transport: T, upload_url: impl Into<String>) -> Self {
        Self {
            transport,
            upload_url: upload_url.into(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    /// Executes a managed request and returns the raw response.
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn request_response(&self, request: Request) -> Result<Response, Error> {
        interpret(self.transport.execute(&request).await)
    }

    /// Executes a managed request and returns the JSON payload.
    pub async fn request_json(&self, request: Request) -> Result<Value, Error> {
        self.request_response(request).await?.json()
    }

    pub async fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<Value, Error> {
        self.request_json(Request::new(Method::GET, url).with_params(params))
            .await
    }

    pub async fn post(
        &self,
        url: &str,
        payload: Option<Value>,
        params: &[(&str, &str)],
    ) -> Result<Value, Error> {
        self.request_json(
            Request::new(Method::POST, url)
                .with_payload(payload)
                .with_params(params),
        )
        .await
    }

    pub async fn patch(
        &self,
        url: &str,
        payload: Option<Value>,
        params: &[(&str, &str)],
    ) -> Result<Value, Error> {
        self.request_json(
            Request::new(Method::PATCH, url)
                .with_payload(payload)
                .with_params(params),
        )
        .await
    }

    pub async fn put(
        &self,
        url: &str,
        payload: Option<Value>,
        params: &[(&str, &str)],
    ) -> Result<Value, Error> {
        self.request_json(
            Request::new(Method::PUT, url)
                .with_payload(payload)
                .with_params(params),
        )
        .await
    }

    /// Successful deletes have an empty body, so the raw response is returned.
    pub async fn delete(&self, url: &str, params: &[(&str, &str)]) -> Result<Response, Error> {
        self.request_response(Request::new(Method::DELETE, url).with_params(params))
            .await
    }

    /// Uploads a file as multipart form data to the upload endpoint.
    pub async fn upload(
        &self,
        file_path: impl AsRef<Path>,
        params: &[(&str, &str)],
    ) -> Result<Value, Error> {
        self.request_json(
            Request::new(Method::POST, self.upload_url.as_str())
                .with_upload(file_path)
                .with_params(params),
        )
        .await
    }

    /// Lazily walks every page of a listing, yielding one [`Record`] per item
    /// with its related objects resolved from the page's `included` set.
    pub fn iterate<'a>(
        &'a self,
        url: &str,
        paging: Paging,
        params: &[(&str, &str)],
    ) -> impl Stream<Item = Result<Record, Error>> + use<'a, T> {
        let params = params
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        paginate(self, url.to_string(), paging, params)
    }

    /// Releases the connection pool now instead of at end of scope.
    pub fn close(self) {
        debug!("Closing client session");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;
    use mockito::Matcher;
    use std::io::Write;
    use std::time::Duration;

    fn config(url: &str) -> ClientConfig {
        ClientConfig {
            api_base: url.to_string(),
            upload_url: format!("{}/v2/files", url),
            timeout: Duration::from_secs(5),
            upload_timeout: Duration::from_secs(5),
            auth_header: "Bearer test-token".to_string(),
            ..ClientConfig::default()
        }
    }

    #[tokio::test]
    async fn test_get_relative_url_with_auth_header() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/people/v2/people/1")
            .match_header("authorization", "Bearer test-token")
            .match_header("user-agent", USER_AGENT)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": {"type": "Person", "id": "1"}}"#)
            .create_async()
            .await;

        let pco = Pco::new(config(&url)).unwrap();
        let result = pco.get("//people/v2//people/1", &[]).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result["data"]["id"], "1");
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/people/v2/people/999")
            .with_status(404)
            .with_body(r#"{"errors": [{"status": "404"}]}"#)
            .create_async()
            .await;

        let pco = Pco::new(config(&url)).unwrap();
        let err = pco.get("/people/v2/people/999", &[]).await.unwrap_err();

        mock.assert_async().await;
        assert_eq!(err.status(), Some(404));
        assert_eq!(
            err.response_body(),
            Some(&br#"{"errors": [{"status": "404"}]}"#[..])
        );
    }

    #[tokio::test]
    async fn test_rate_limited_then_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let throttled = server
            .mock("GET", "/people/v2")
            .with_status(429)
            .with_header("retry-after", "1")
            .expect(1)
            .create_async()
            .await;

        let pco = Pco::new(config(&url)).unwrap();
        let request = pco.get("/people/v2", &[]);
        tokio::pin!(request);

        // First attempt gets the 429; swap the mock while the client sleeps.
        tokio::select! {
            _ = &mut request => panic!("request finished before the rate limit cleared"),
            _ = tokio::time::sleep(Duration::from_millis(500)) => {}
        }
        throttled.remove_async().await;
        let ok = server
            .mock("GET", "/people/v2")
            .with_status(200)
            .with_body(r#"{"data": []}"#)
            .expect(1)
            .create_async()
            .await;

        let result = request.await.unwrap();
        ok.assert_async().await;
        assert_eq!(result["data"], json!([]));
    }

    #[tokio::test]
    async fn test_post_patch_put_send_payload() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let payload = Pco::template("Person", Some(json!({"first_name": "Pico"})));

        let mut mocks = Vec::new();
        for method in ["POST", "PATCH", "PUT"] {
            mocks.push(
                server
                    .mock(method, "/people/v2/people")
                    .match_body(Matcher::Json(payload.clone()))
                    .with_status(200)
                    .with_body(r#"{"data": {"id": "1"}}"#)
                    .create_async()
                    .await,
            );
        }

        let pco = Pco::new(config(&url)).unwrap();
        pco.post("/people/v2/people", Some(payload.clone()), &[])
            .await
            .unwrap();
        pco.patch("/people/v2/people", Some(payload.clone()), &[])
            .await
            .unwrap();
        pco.put("/people/v2/people", Some(payload.clone()), &[])
            .await
            .unwrap();

        for mock in mocks {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_delete_returns_response() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("DELETE", "/people/v2/people/1")
            .with_status(204)
            .create_async()
            .await;

        let pco = Pco::new(config(&url)).unwrap();
        let response = pco.delete("/people/v2/people/1", &[]).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status().as_u16(), 204);
        assert!(response.text().is_empty());
    }

    #[tokio::test]
    async fn test_upload_uses_upload_url() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"file bytes").unwrap();

        let mock = server
            .mock("POST", "/v2/files?name=avatar")
            .match_body(Matcher::Regex("file bytes".to_string()))
            .with_status(200)
            .with_body(r#"{"data": [{"type": "File", "id": "u1"}]}"#)
            .create_async()
            .await;

        let pco = Pco::new(config(&url)).unwrap();
        let result = pco.upload(file.path(), &[("name", "avatar")]).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result["data"][0]["id"], "u1");
    }

    #[tokio::test]
    async fn test_network_failure_is_unexpected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let pco = Pco::new(config(&format!("http://{}", addr))).unwrap();
        let result = pco.get("/people/v2", &[]).await;

        assert!(matches!(result, Err(Error::UnexpectedRequest(_))));
    }

    #[tokio::test]
    async fn test_iterate_two_pages() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let page1 = server
            .mock("GET", "/people/v2/people?offset=0&per_page=2&include=emails")
            .with_status(200)
            .with_body(format!(
                r#"{{"data": [{{"type": "Person", "id": "1"}}, {{"type": "Person", "id": "2"}}],
                    "included": [], "meta": {{}},
                    "links": {{"next": "{}/people/v2/people?offset=2"}}}}"#,
                url
            ))
            .expect(1)
            .create_async()
            .await;
        let page2 = server
            .mock("GET", "/people/v2/people?offset=2&per_page=2&include=emails")
            .with_status(200)
            .with_body(r#"{"data": [{"type": "Person", "id": "3"}], "included": [], "meta": {}, "links": {}}"#)
            .expect(1)
            .create_async()
            .await;
        let page3 = server
            .mock("GET", "/people/v2/people?offset=4&per_page=2&include=emails")
            .expect(0)
            .create_async()
            .await;

        let pco = Pco::new(config(&url)).unwrap();
        let records: Vec<Record> = pco
            .iterate(
                "/people/v2/people",
                Paging {
                    offset: 0,
                    per_page: 2,
                },
                &[("include", "emails")],
            )
            .try_collect()
            .await
            .unwrap();

        page1.assert_async().await;
        page2.assert_async().await;
        page3.assert_async().await;
        let ids: Vec<&str> = records
            .iter()
            .map(|r| r.data["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_template() {
        assert_eq!(
            Pco::template("Person", None),
            json!({"data": {"type": "Person", "attributes": {}}})
        );
        assert_eq!(
            Pco::template("Email", Some(json!({"address": "a@b.c"}))),
            json!({"data": {"type": "Email", "attributes": {"address": "a@b.c"}}})
        );
    }

    #[test]
    fn test_invalid_auth_header() {
        let config = ClientConfig {
            auth_header: "Bearer bad\nheader".to_string(),
            ..ClientConfig::default()
        };
        assert!(matches!(Pco::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_close() {
        let pco = Pco::new(ClientConfig::default()).unwrap();
        assert_eq!(pco.transport().api_base(), "https://api.planningcenteronline.com");
        assert_eq!(pco.upload_url(), "https://upload.planningcenteronline.com/v2/files");
        pco.close();
    }
}
