//! Classification of the final outcome of a managed request.

use log::debug;
use serde_json::Value;

use super::request::Response;
use crate::error::Error;

/// Maps the result of the request stack onto the public error taxonomy.
///
/// `RequestTimeoutExceeded`, `Request` and `UnexpectedRequest` pass through.
/// Any other failure becomes `UnexpectedRequest`. A 4xx/5xx response
/// becomes `Request` carrying the status, a message and the raw body.
pub fn interpret(result: Result<Response, Error>) -> Result<Response, Error> {
    let response = result.map_err(|err| match err {
        Error::RequestTimeoutExceeded { .. } | Error::Request { .. } | Error::UnexpectedRequest(_) => {
            err
        }
        other => {
            debug!("Request resulted in unexpected error: \"{}\"", other);
            Error::UnexpectedRequest(other.to_string())
        }
    })?;

    check_status(response)
}

/// Like [`interpret`], then parses the body as JSON.
pub fn interpret_json(result: Result<Response, Error>) -> Result<Value, Error> {
    interpret(result)?.json()
}

fn check_status(response: Response) -> Result<Response, Error> {
    let status = response.status();

    let kind = if status.is_client_error() {
        "Client"
    } else if status.is_server_error() {
        "Server"
    } else {
        return Ok(response);
    };

    let message = format!(
        "{} {} Error: {} for url: {}",
        status.as_u16(),
        kind,
        status.canonical_reason().unwrap_or("Unknown"),
        response.url()
    );
    debug!("Request resulted in API error: \"{}\"", message);

    Err(Error::Request {
        status: status.as_u16(),
        message,
        body: response.into_bytes(),
    })
}
