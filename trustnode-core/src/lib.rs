//! Core data models, key material and token protocol for trustnode

pub mod auth;
pub mod error;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::*;
pub use types::*;

/// Result type alias for trustnode operations
pub type Result<T> = std::result::Result<T, TrustError>;
