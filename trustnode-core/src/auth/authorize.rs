//! Bearer token authorization
//!
//! Verifies an inbound `Authorization: Bearer <token>` value by fetching the
//! issuer's key directory, locating the signing key by key id, and checking
//! the RS256 signature. Every failure is reported as an [`AuthorizationResult`]
//! carrying the HTTP status the caller should answer with; nothing here is
//! fatal to the connection.

use crate::auth::{Jwt, KeyDirectorySource};
use crate::HttpStatus;
use std::sync::Arc;
use tracing::{debug, warn};

/// Scheme prefix expected on the `Authorization` header
pub const BEARER_PREFIX: &str = "Bearer ";

pub const MSG_MISSING_HEADER: &str = "missing Authorization header";
pub const MSG_UNPARSEABLE: &str = "unable to parse token";
pub const MSG_DIRECTORY_UNAVAILABLE: &str = "unable to fetch issuer's key directory";
pub const MSG_KEY_NOT_FOUND: &str = "unable to obtain key from issuer's directory";
pub const MSG_VERIFICATION_FAILED: &str = "token authorization failed";
pub const MSG_EXPIRED: &str = "token expired";

/// What to do with a verified token whose `exp` has passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPolicy {
    /// Accept regardless of `exp`
    Ignore,
    /// Reject when `exp + leeway` is in the past
    Enforce { leeway_secs: u64 },
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        ExpiryPolicy::Enforce { leeway_secs: 5 }
    }
}

/// Outcome of verifying one bearer credential
#[derive(Debug, Clone)]
pub struct AuthorizationResult {
    pub status: HttpStatus,
    pub message: String,
    /// Parsed token, verified only when `status` is Ok
    pub token: Option<Jwt>,
}

impl AuthorizationResult {
    fn ok(token: Jwt) -> Self {
        AuthorizationResult {
            status: HttpStatus::Ok,
            message: String::new(),
            token: Some(token),
        }
    }

    fn fail(status: HttpStatus, message: &str, token: Option<Jwt>) -> Self {
        AuthorizationResult {
            status,
            message: message.to_string(),
            token,
        }
    }

    pub fn is_authorized(&self) -> bool {
        self.status.is_success()
    }
}

/// Verifies bearer tokens against their issuers' key directories
pub struct Authorizer<S> {
    source: S,
    expiry: ExpiryPolicy,
}

impl<S: KeyDirectorySource> Authorizer<S> {
    pub fn new(source: S) -> Self {
        Authorizer {
            source,
            expiry: ExpiryPolicy::default(),
        }
    }

    pub fn with_expiry_policy(mut self, expiry: ExpiryPolicy) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn expiry_policy(&self) -> ExpiryPolicy {
        self.expiry
    }

    /// Verify the value of an `Authorization` header at time `now`
    pub fn authorize(&self, authorization: Option<&str>, now: u64) -> AuthorizationResult {
        let compact = match authorization.and_then(|value| value.strip_prefix(BEARER_PREFIX)) {
            Some(compact) => compact.trim(),
            None => return AuthorizationResult::fail(HttpStatus::BadRequest, MSG_MISSING_HEADER, None),
        };

        let parsed = match Jwt::parse(compact) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Rejecting bearer token: {}", e);
                return AuthorizationResult::fail(HttpStatus::BadRequest, MSG_UNPARSEABLE, None);
            }
        };

        let issuer = parsed.payload.iss.clone();
        let directory = match self.source.fetch(&issuer) {
            Ok(directory) => directory,
            Err(e) => {
                warn!("Key directory of {} unavailable: {}", issuer, e);
                return AuthorizationResult::fail(
                    HttpStatus::BadRequest,
                    MSG_DIRECTORY_UNAVAILABLE,
                    Some(parsed.into_token(None)),
                );
            }
        };

        let key = match directory.find(&parsed.header.kid).map(|jwk| jwk.to_public_key()) {
            Some(Ok(key)) => Arc::new(key),
            Some(Err(e)) => {
                warn!("Key {} published by {} is unusable: {}", parsed.header.kid, issuer, e);
                return AuthorizationResult::fail(
                    HttpStatus::BadRequest,
                    MSG_KEY_NOT_FOUND,
                    Some(parsed.into_token(None)),
                );
            }
            None => {
                debug!("Key {} not published by {}", parsed.header.kid, issuer);
                return AuthorizationResult::fail(
                    HttpStatus::BadRequest,
                    MSG_KEY_NOT_FOUND,
                    Some(parsed.into_token(None)),
                );
            }
        };

        let verified = parsed.verify_with(&key);
        let token = parsed.into_token(Some(key));
        if !verified {
            return AuthorizationResult::fail(HttpStatus::Unauthorized, MSG_VERIFICATION_FAILED, Some(token));
        }

        if let ExpiryPolicy::Enforce { leeway_secs } = self.expiry {
            if token.is_expired(now, leeway_secs) {
                return AuthorizationResult::fail(HttpStatus::Unauthorized, MSG_EXPIRED, Some(token));
            }
        }

        debug!("Authorized token from {}", issuer);
        AuthorizationResult::ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{codec, JwkSet};
    use crate::test_utils::{second_key_pair, shared_key_arc, FailingDirectory, StaticDirectory};

    const NODE_A: &str = "http://node-a:8080";
    const NODE_B: &str = "http://node-b:8080";
    const NOW: u64 = 1_700_000_000;

    fn authorizer() -> Authorizer<StaticDirectory> {
        Authorizer::new(StaticDirectory::new().with(NODE_A, JwkSet::for_key(&shared_key_arc())))
    }

    fn bearer() -> String {
        let token = Jwt::for_target(NODE_A, NODE_B, shared_key_arc(), NOW);
        format!("Bearer {}", token.pack().unwrap())
    }

    #[test]
    fn test_valid_token_is_authorized() {
        let result = authorizer().authorize(Some(&bearer()), NOW + 1);

        assert!(result.is_authorized());
        let token = result.token.unwrap();
        assert_eq!(token.payload().iss, NODE_A);
        assert_eq!(token.payload().aud, NODE_B);
        let key = token.signing_key().unwrap();
        assert!(!key.has_private_key());
        assert_eq!(key.key_id(), shared_key_arc().key_id());
    }

    #[test]
    fn test_missing_or_non_bearer_header() {
        for header in [None, Some(""), Some("Basic dXNlcjpwYXNz"), Some("bearer abc.def.ghi")] {
            let result = authorizer().authorize(header, NOW);
            assert_eq!(result.status, HttpStatus::BadRequest);
            assert_eq!(result.message, MSG_MISSING_HEADER);
            assert!(result.token.is_none());
        }
    }

    #[test]
    fn test_wrong_segment_count() {
        for value in ["Bearer a.b", "Bearer a.b.c.d", "Bearer "] {
            let result = authorizer().authorize(Some(value), NOW);
            assert_eq!(result.status, HttpStatus::BadRequest);
            assert_eq!(result.message, MSG_UNPARSEABLE);
        }
    }

    #[test]
    fn test_undecodable_segments() {
        let result = authorizer().authorize(Some("Bearer !!.??.**"), NOW);
        assert_eq!(result.status, HttpStatus::BadRequest);
        assert_eq!(result.message, MSG_UNPARSEABLE);
    }

    #[test]
    fn test_tampered_signature_is_unauthorized() {
        let value = bearer();
        let (message, signature) = value.rsplit_once('.').unwrap();
        let mut bytes = codec::decode(signature).unwrap();
        bytes[10] ^= 0x01;
        let tampered = format!("{}.{}", message, codec::encode(bytes));

        let result = authorizer().authorize(Some(&tampered), NOW);
        assert_eq!(result.status, HttpStatus::Unauthorized);
        assert_eq!(result.message, MSG_VERIFICATION_FAILED);
        assert_eq!(result.token.unwrap().payload().iss, NODE_A);
    }

    #[test]
    fn test_unknown_key_id() {
        let directory = StaticDirectory::new().with(NODE_A, JwkSet::for_key(second_key_pair()));
        let result = Authorizer::new(directory).authorize(Some(&bearer()), NOW);

        assert_eq!(result.status, HttpStatus::BadRequest);
        assert_eq!(result.message, MSG_KEY_NOT_FOUND);
        assert!(result.token.unwrap().signing_key().is_none());
    }

    #[test]
    fn test_directory_fetch_failure() {
        let result = Authorizer::new(FailingDirectory).authorize(Some(&bearer()), NOW);

        assert_eq!(result.status, HttpStatus::BadRequest);
        assert_eq!(result.message, MSG_DIRECTORY_UNAVAILABLE);
        assert!(result.token.is_some());
    }

    #[test]
    fn test_key_swapped_under_same_kid_fails_verification() {
        let mut jwks = JwkSet::for_key(second_key_pair());
        jwks.keys[0].kid = Some(shared_key_arc().key_id().to_string());
        let directory = StaticDirectory::new().with(NODE_A, jwks);

        let result = Authorizer::new(directory).authorize(Some(&bearer()), NOW);
        assert_eq!(result.status, HttpStatus::Unauthorized);
    }

    #[test]
    fn test_expiry_policy() {
        let late = NOW + 60;

        let enforced = authorizer().authorize(Some(&bearer()), late);
        assert_eq!(enforced.status, HttpStatus::Unauthorized);
        assert_eq!(enforced.message, MSG_EXPIRED);

        let ignored = authorizer()
            .with_expiry_policy(ExpiryPolicy::Ignore)
            .authorize(Some(&bearer()), late);
        assert!(ignored.is_authorized());

        let within_leeway = authorizer().authorize(Some(&bearer()), NOW + 33);
        assert!(within_leeway.is_authorized());
    }
}
