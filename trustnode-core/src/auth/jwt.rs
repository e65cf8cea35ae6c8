//! Compact RS256 tokens
//!
//! A token is `base64url(header) "." base64url(payload) "." base64url(signature)`
//! where header and payload are JSON objects and the signature is RS256 over
//! the first two segments joined by a dot.

use crate::auth::{codec, KeyId, KeyPair};
use crate::{Result, TrustError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Signature algorithm carried in every header
pub const ALGORITHM: &str = "RS256";

/// Token type carried in every header
pub const TOKEN_TYPE: &str = "JWT";

/// Seconds between issue and expiry
pub const TOKEN_LIFETIME_SECS: u64 = 30;

/// Token header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
    pub kid: String,
}

/// Token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtPayload {
    /// Issuer base URL
    pub iss: String,
    /// Subject base URL
    pub sub: String,
    /// Audience base URL
    pub aud: String,
    /// Issued at, epoch seconds
    pub iat: u64,
    /// Expiry, epoch seconds
    pub exp: u64,
}

/// A token held in memory, optionally with the key that signed or verified it
///
/// The key never leaves the process; only header and payload are serialized.
#[derive(Clone)]
pub struct Jwt {
    header: JwtHeader,
    payload: JwtPayload,
    signing_key: Option<Arc<KeyPair>>,
}

impl Jwt {
    /// Issue a token signed by `key`, valid for [`TOKEN_LIFETIME_SECS`] from `now`
    pub fn issue(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        audience: impl Into<String>,
        key: Arc<KeyPair>,
        now: u64,
    ) -> Self {
        Jwt {
            header: JwtHeader {
                alg: ALGORITHM.to_string(),
                typ: TOKEN_TYPE.to_string(),
                kid: key.key_id().to_string(),
            },
            payload: JwtPayload {
                iss: issuer.into(),
                sub: subject.into(),
                aud: audience.into(),
                iat: now,
                exp: now.saturating_add(TOKEN_LIFETIME_SECS),
            },
            signing_key: Some(key),
        }
    }

    /// Token a node presents to `target_url` to prove it is `self_url`
    pub fn for_target(self_url: &str, target_url: &str, key: Arc<KeyPair>, now: u64) -> Self {
        Jwt::issue(self_url, self_url, target_url, key, now)
    }

    /// Assemble a token from already decoded parts
    pub fn from_parts(header: JwtHeader, payload: JwtPayload, signing_key: Option<Arc<KeyPair>>) -> Self {
        Jwt {
            header,
            payload,
            signing_key,
        }
    }

    pub fn header(&self) -> &JwtHeader {
        &self.header
    }

    pub fn payload(&self) -> &JwtPayload {
        &self.payload
    }

    pub fn signing_key(&self) -> Option<&Arc<KeyPair>> {
        self.signing_key.as_ref()
    }

    /// Key id named in the header
    pub fn key_id(&self) -> KeyId {
        KeyId::from_string(self.header.kid.clone())
    }

    /// Whether the token has expired at `now`, allowing `leeway` seconds of skew
    pub fn is_expired(&self, now: u64, leeway: u64) -> bool {
        self.payload.exp.saturating_add(leeway) < now
    }

    /// Encode and sign into the compact form
    pub fn pack(&self) -> Result<String> {
        let key = self.signing_key.as_ref().ok_or(TrustError::MissingSigningKey)?;

        let message = format!(
            "{}.{}",
            codec::encode(serde_json::to_vec(&self.header)?),
            codec::encode(serde_json::to_vec(&self.payload)?)
        );
        let signature = key.sign(&message)?;

        Ok(format!("{}.{}", message, codec::encode(signature)))
    }

    /// Decode a compact token without verifying its signature
    pub fn parse(compact: &str) -> Result<ParsedToken> {
        let parts: Vec<&str> = compact.split('.').collect();
        if parts.len() != 3 {
            return Err(TrustError::InvalidToken(format!(
                "expected 3 segments, found {}",
                parts.len()
            )));
        }

        let header: JwtHeader = serde_json::from_slice(&codec::decode(parts[0])?)?;
        let payload: JwtPayload = serde_json::from_slice(&codec::decode(parts[1])?)?;
        let signature = codec::decode(parts[2].trim())?;

        Ok(ParsedToken {
            header,
            payload,
            signing_input: format!("{}.{}", parts[0], parts[1]),
            signature,
        })
    }
}

impl fmt::Debug for Jwt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jwt")
            .field("header", &self.header)
            .field("payload", &self.payload)
            .field("signed", &self.signing_key.is_some())
            .finish()
    }
}

/// Decoded but unverified compact token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedToken {
    pub header: JwtHeader,
    pub payload: JwtPayload,
    /// The exact `header.payload` text the signature covers
    pub signing_input: String,
    pub signature: Vec<u8>,
}

impl ParsedToken {
    /// Check the signature with `key`
    pub fn verify_with(&self, key: &KeyPair) -> bool {
        key.verify(&self.signing_input, &self.signature)
    }

    /// Turn into an in-memory token, optionally attaching the verifying key
    pub fn into_token(self, key: Option<Arc<KeyPair>>) -> Jwt {
        Jwt::from_parts(self.header, self.payload, key)
    }
}
