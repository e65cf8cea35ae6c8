//! Remote key directory lookup
//!
//! Fetches `{issuer}/.well-known/jwks.json` on every call. Transport errors,
//! non-success statuses and malformed bodies all surface as
//! [`TrustError::DirectoryUnavailable`] so the authorizer can answer 400.

use crate::Client;
use tracing::debug;
use trustnode_core::auth::{jwks_url, JwkSet, KeyDirectorySource};
use trustnode_core::TrustError;

/// Key directory source backed by plain HTTP
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpDirectorySource {
    client: Client,
}

impl HttpDirectorySource {
    pub fn new() -> Self {
        HttpDirectorySource { client: Client::new() }
    }
}

impl KeyDirectorySource for HttpDirectorySource {
    fn fetch(&self, issuer_base_url: &str) -> trustnode_core::Result<JwkSet> {
        let url = jwks_url(issuer_base_url);
        debug!("Fetching key directory {}", url);

        let response = self
            .client
            .get(&url)
            .map_err(|e| TrustError::DirectoryUnavailable(format!("{}: {}", url, e)))?;

        if !response.is_success() {
            return Err(TrustError::DirectoryUnavailable(format!(
                "{}: status {}",
                url, response.status
            )));
        }

        JwkSet::from_json(&response.body)
            .map_err(|e| TrustError::DirectoryUnavailable(format!("{}: {}", url, e)))
    }
}
