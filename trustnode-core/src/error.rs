//! Error types for trustnode

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrustError {
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Key {0} has no private component and cannot sign")]
    MissingPrivateKey(String),

    #[error("Token has no attached signing key")]
    MissingSigningKey,

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Key directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rsa::Error> for TrustError {
    fn from(err: rsa::Error) -> Self {
        TrustError::InvalidKey(err.to_string())
    }
}
