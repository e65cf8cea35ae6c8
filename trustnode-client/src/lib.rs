//! trustnode HTTP client
//!
//! Blocking outbound calls: fetching peers' key directories and calling peers
//! with a bearer token that proves this node's identity.

pub mod client;
pub mod directory;
pub mod error;

pub use client::{Client, HttpResponse, NodeClient};
pub use directory::HttpDirectorySource;
pub use error::ClientError;

pub type Result<T> = std::result::Result<T, ClientError>;
