//! Client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported scheme: {0} (only plain http is supported)")]
    UnsupportedScheme(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Core error: {0}")]
    Core(#[from] trustnode_core::TrustError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),
}

impl From<hyper::http::Error> for ClientError {
    fn from(err: hyper::http::Error) -> Self {
        ClientError::Request(err.to_string())
    }
}
