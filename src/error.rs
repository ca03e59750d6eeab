//! Error taxonomy shared by every layer of the request pipeline.

use thiserror::Error;

/// Errors produced while executing a managed request.
///
/// `Timeout` and `Network` are transport-level outcomes. They only reach
/// callers of [`crate::Pco`] wrapped in [`Error::UnexpectedRequest`]; the
/// other three variants are what callers actually see.
#[derive(Error, Debug)]
pub enum Error {
    /// A single attempt timed out before a response was observed.
    #[error("Request timed out")]
    Timeout,

    /// Any other transport failure (connect, TLS, upload file I/O, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// The timeout-retry ceiling was reached.
    #[error("The request to \"{url}\" timed out after {attempts} tries.")]
    RequestTimeoutExceeded { url: String, attempts: u32 },

    /// The service rejected the request with a 4xx/5xx status.
    #[error("{message}")]
    Request {
        status: u16,
        message: String,
        body: Vec<u8>,
    },

    /// Anything not covered above, including malformed responses.
    #[error("Unexpected request error: {0}")]
    UnexpectedRequest(String),

    /// Invalid credentials or client settings, raised before any request.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Returns true for failures the timeout-retry layer may re-issue.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    /// HTTP status carried by a [`Error::Request`], if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response body carried by a [`Error::Request`], if any.
    pub fn response_body(&self) -> Option<&[u8]> {
        match self {
            Error::Request { body, .. } => Some(body.as_slice()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_timeout_exceeded_display() {
        let err = Error::RequestTimeoutExceeded {
            url: "https://api.example.com/people/v2".to_string(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "The request to \"https://api.example.com/people/v2\" timed out after 3 tries."
        );
    }

    #[test]
    fn test_request_error_accessors() {
        let err = Error::Request {
            status: 404,
            message: "404 Client Error: Not Found for url: x".to_string(),
            body: br#"{"errors":[]}"#.to_vec(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.response_body(), Some(&br#"{"errors":[]}"#[..]));
        assert!(err.to_string().starts_with("404 Client Error"));
    }

    #[test]
    fn test_only_timeout_is_retryable() {
        assert!(Error::Timeout.is_timeout());
        assert!(!Error::Network("connection reset".into()).is_timeout());
        assert!(
            !Error::RequestTimeoutExceeded {
                url: String::new(),
                attempts: 1
            }
            .is_timeout()
        );
        assert_eq!(Error::UnexpectedRequest("x".into()).status(), None);
    }
}
