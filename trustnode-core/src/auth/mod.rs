//! Node identity and trust module for trustnode
//!
//! This module implements the trust plane with:
//! - RSA key management (RS256 signing and verification)
//! - URL-safe base64 codec shared by every wire format
//! - Compact signed tokens and published key directories
//! - Bearer token authorization against an issuer's key directory

pub mod authorize;
pub mod codec;
pub mod jwks;
pub mod jwt;
pub mod keys;
pub mod timing;

pub use authorize::*;
pub use jwks::*;
pub use jwt::*;
pub use keys::*;
pub use timing::*;
