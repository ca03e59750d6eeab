use anyhow::{Context, Result};
use futures_util::TryStreamExt;
use log::{debug, info};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;

use crate::{client::Pco, http::Transport, iterate::Paging};

pub mod config;

pub use config::Settings;

/// One command-line operation against the API.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Get {
        url: String,
        params: Vec<(String, String)>,
    },
    Post {
        url: String,
        data: Option<Value>,
        params: Vec<(String, String)>,
    },
    Patch {
        url: String,
        data: Option<Value>,
        params: Vec<(String, String)>,
    },
    Put {
        url: String,
        data: Option<Value>,
        params: Vec<(String, String)>,
    },
    Delete {
        url: String,
        params: Vec<(String, String)>,
    },
    Iterate {
        url: String,
        paging: Paging,
        params: Vec<(String, String)>,
    },
    Upload {
        path: PathBuf,
        params: Vec<(String, String)>,
    },
    Template {
        object_type: String,
        attributes: Option<Value>,
    },
}

/// Parses a `key=value` query parameter.
pub fn parse_query_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("invalid query parameter '{}', expected key=value", s)),
    }
}

/// Parses a JSON document given on the command line.
pub fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {}", e))
}

/// Prints a payload skeleton for creating an object.
pub fn template<W: Write>(object_type: &str, attributes: Option<Value>, out: &mut W) -> Result<()> {
    let template = Pco::template(object_type, attributes);
    writeln!(out, "{}", serde_json::to_string_pretty(&template)?)?;
    Ok(())
}

/// Runs `action` and writes its result to `out`.
///
/// JSON payloads are pretty-printed, `iterate` writes one compact record per
/// line as it arrives, and `delete` writes the response status code.
/// `template` never touches the client.
#[tracing::instrument(skip(client, out))]
pub async fn run<T: Transport, W: Write>(client: &Pco<T>, action: Action, out: &mut W) -> Result<()> {
    match action {
        Action::Get { url, params } => {
            let value = client.get(&url, &borrow(&params)).await?;
            print_json(out, &value)
        }
        Action::Post { url, data, params } => {
            let value = client.post(&url, data, &borrow(&params)).await?;
            print_json(out, &value)
        }
        Action::Patch { url, data, params } => {
            let value = client.patch(&url, data, &borrow(&params)).await?;
            print_json(out, &value)
        }
        Action::Put { url, data, params } => {
            let value = client.put(&url, data, &borrow(&params)).await?;
            print_json(out, &value)
        }
        Action::Delete { url, params } => {
            let response = client.delete(&url, &borrow(&params)).await?;
            writeln!(out, "{}", response.status().as_u16())?;
            Ok(())
        }
        Action::Iterate { url, paging, params } => {
            let params = borrow(&params);
            let mut records = Box::pin(client.iterate(&url, paging, &params));
            let mut count = 0usize;

            while let Some(record) = records
                .try_next()
                .await
                .with_context(|| format!("Failed while iterating {}", url))?
            {
                writeln!(out, "{}", serde_json::to_string(&record)?)?;
                count += 1;
            }

            info!("Iterated {} record(s) from {}", count, url);
            Ok(())
        }
        Action::Upload { path, params } => {
            debug!("Uploading {:?}", path);
            let value = client
                .upload(&path, &borrow(&params))
                .await
                .with_context(|| format!("Failed to upload {:?}", path))?;
            print_json(out, &value)
        }
        Action::Template {
            object_type,
            attributes,
        } => template(&object_type, attributes, out),
    }
}

fn borrow(params: &[(String, String)]) -> Vec<(&str, &str)> {
    params
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect()
}

fn print_json<W: Write>(out: &mut W, value: &Value) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}
