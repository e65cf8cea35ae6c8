//! Published key directories
//!
//! A node publishes its public key as a one-record [`JwkSet`] at
//! [`WELL_KNOWN_JWKS_PATH`]. Verifiers fetch the issuer's set through a
//! [`KeyDirectorySource`] and pick the record named by the token's key id.

use crate::auth::{codec, constant_time_str_compare, KeyId, KeyPair, ALGORITHM};
use crate::{Result, TrustError};
use serde::{Deserialize, Serialize};

/// Path a node serves its key directory on
pub const WELL_KNOWN_JWKS_PATH: &str = "/.well-known/jwks.json";

/// One published public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    pub kty: String,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5t: Option<String>,
}

impl Jwk {
    /// Record describing the public half of `key`
    pub fn from_key_pair(key: &KeyPair) -> Self {
        Jwk {
            alg: Some(ALGORITHM.to_string()),
            kty: "RSA".to_string(),
            key_use: Some("sig".to_string()),
            x5c: None,
            e: Some(codec::encode(key.public_exponent())),
            n: Some(codec::encode(key.modulus())),
            kid: Some(key.key_id().to_string()),
            x5t: None,
        }
    }

    /// Rebuild a verification-only key carrying this record's key id
    pub fn to_public_key(&self) -> Result<KeyPair> {
        let (e, n) = match (&self.e, &self.n) {
            (Some(e), Some(n)) => (e, n),
            _ => {
                return Err(TrustError::InvalidKey(
                    "record has no exponent or modulus".to_string(),
                ))
            }
        };

        let key = KeyPair::from_public_components(e, n)?;
        Ok(match &self.kid {
            Some(kid) => key.with_key_id(KeyId::from_string(kid.clone())),
            None => key,
        })
    }
}

/// Ordered set of published keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    #[serde(default)]
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// The single-record directory a node publishes for its own key
    pub fn for_key(key: &KeyPair) -> Self {
        JwkSet {
            keys: vec![Jwk::from_key_pair(key)],
        }
    }

    /// Linear lookup by key id
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|jwk| {
            jwk.kid
                .as_deref()
                .is_some_and(|candidate| constant_time_str_compare(candidate, kid))
        })
    }

    pub fn from_json(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Where a verifier obtains an issuer's key directory
///
/// Implementations block the calling thread for the duration of the lookup.
pub trait KeyDirectorySource: Send + Sync {
    /// Fetch the directory published by the node at `issuer_base_url`
    fn fetch(&self, issuer_base_url: &str) -> Result<JwkSet>;
}

impl<S: KeyDirectorySource + ?Sized> KeyDirectorySource for std::sync::Arc<S> {
    fn fetch(&self, issuer_base_url: &str) -> Result<JwkSet> {
        (**self).fetch(issuer_base_url)
    }
}

/// URL of the key directory published by the node at `base_url`
pub fn jwks_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), WELL_KNOWN_JWKS_PATH)
}
