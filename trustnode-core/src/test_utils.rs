//! Test utilities for trustnode
//!
//! RSA key generation is slow, so tests share a pair of lazily generated keys.

use crate::auth::{jwks_url, JwkSet, KeyDirectorySource, KeyPair};
use crate::{Result, TrustError};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

static PRIMARY: OnceLock<Arc<KeyPair>> = OnceLock::new();
static SECONDARY: OnceLock<Arc<KeyPair>> = OnceLock::new();

fn generate_or_panic() -> Arc<KeyPair> {
    Arc::new(KeyPair::generate().expect("RSA key generation failed"))
}

/// Process-wide key pair for tests
pub fn shared_key_pair() -> &'static KeyPair {
    PRIMARY.get_or_init(generate_or_panic)
}

/// The same key as [`shared_key_pair`], shareable like a node identity
pub fn shared_key_arc() -> Arc<KeyPair> {
    PRIMARY.get_or_init(generate_or_panic).clone()
}

/// A second, unrelated key pair
pub fn second_key_pair() -> &'static KeyPair {
    SECONDARY.get_or_init(generate_or_panic)
}

pub fn second_key_arc() -> Arc<KeyPair> {
    SECONDARY.get_or_init(generate_or_panic).clone()
}

/// In-memory directory source keyed by issuer base URL
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    directories: HashMap<String, JwkSet>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, issuer_base_url: &str, jwks: JwkSet) -> Self {
        self.directories.insert(issuer_base_url.to_string(), jwks);
        self
    }
}

impl KeyDirectorySource for StaticDirectory {
    fn fetch(&self, issuer_base_url: &str) -> Result<JwkSet> {
        self.directories
            .get(issuer_base_url)
            .cloned()
            .ok_or_else(|| TrustError::DirectoryUnavailable(jwks_url(issuer_base_url)))
    }
}

/// Directory source whose every fetch fails
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingDirectory;

impl KeyDirectorySource for FailingDirectory {
    fn fetch(&self, issuer_base_url: &str) -> Result<JwkSet> {
        Err(TrustError::DirectoryUnavailable(format!(
            "connection refused: {}",
            jwks_url(issuer_base_url)
        )))
    }
}
