pub mod auth;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod iterate;
pub mod runtime;

pub use auth::Credentials;
pub use client::Pco;
pub use config::ClientConfig;
pub use error::Error;
pub use iterate::{Paging, Record};
