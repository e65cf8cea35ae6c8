//! RSA key management
//!
//! Provides key generation, public component export and RS256
//! (SHA-256 + RSASSA-PKCS1-v1.5) signing and verification.

use crate::auth::codec;
use crate::{Result, TrustError};
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Modulus size of every generated key
pub const KEY_BITS: usize = 2048;

/// Public exponent of every generated key (F4)
pub const PUBLIC_EXPONENT: u32 = 65537;

/// RSA key pair identified by a process-unique key id
///
/// A key pair is either complete (generated locally, can sign) or public-only
/// (rebuilt from a peer's published components, can only verify).
#[derive(Clone)]
pub struct KeyPair {
    key_id: KeyId,
    private_key: Option<RsaPrivateKey>,
    public_key: RsaPublicKey,
}

impl KeyPair {
    /// Generate a new 2048-bit key pair with public exponent 65537
    pub fn generate() -> Result<Self> {
        let private_key = RsaPrivateKey::new_with_exp(
            &mut OsRng,
            KEY_BITS,
            &BigUint::from(PUBLIC_EXPONENT),
        )?;
        let public_key = private_key.to_public_key();

        Ok(KeyPair {
            key_id: KeyId::generate(),
            private_key: Some(private_key),
            public_key,
        })
    }

    /// Rebuild a verification-only key from base64url big-endian exponent and modulus
    ///
    /// The returned key carries a freshly minted local key id, not the id the
    /// components were published under. Use [`KeyPair::with_key_id`] to adopt
    /// the published one.
    pub fn from_public_components(exponent_b64: &str, modulus_b64: &str) -> Result<Self> {
        let e = codec::decode(exponent_b64)?;
        let n = codec::decode(modulus_b64)?;
        if e.is_empty() || n.is_empty() {
            return Err(TrustError::InvalidKey("empty exponent or modulus".to_string()));
        }

        let public_key = RsaPublicKey::new(BigUint::from_bytes_be(&n), BigUint::from_bytes_be(&e))?;

        Ok(KeyPair {
            key_id: KeyId::generate(),
            private_key: None,
            public_key,
        })
    }

    /// Relabel this key with a given key id
    pub fn with_key_id(mut self, key_id: KeyId) -> Self {
        self.key_id = key_id;
        self
    }

    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    /// Whether this key can produce signatures
    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    /// Public exponent as canonical big-endian bytes
    pub fn public_exponent(&self) -> Vec<u8> {
        self.public_key.e().to_bytes_be()
    }

    /// Modulus as canonical big-endian bytes
    pub fn modulus(&self) -> Vec<u8> {
        self.public_key.n().to_bytes_be()
    }

    /// SubjectPublicKeyInfo PEM of the public half
    pub fn public_key_pem(&self) -> Result<String> {
        self.public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| TrustError::InvalidKey(format!("PEM export failed: {}", e)))
    }

    /// RS256 signature over the UTF-8 bytes of `message`
    pub fn sign(&self, message: &str) -> Result<Vec<u8>> {
        let private_key = self
            .private_key
            .as_ref()
            .ok_or_else(|| TrustError::MissingPrivateKey(self.key_id.to_string()))?;

        let digest = Sha256::digest(message.as_bytes());
        private_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| TrustError::Signing(e.to_string()))
    }

    /// Check an RS256 signature; any mismatch or malformed signature yields false
    pub fn verify(&self, message: &str, signature: &[u8]) -> bool {
        let digest = Sha256::digest(message.as_bytes());
        self.public_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
            .is_ok()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_id", &self.key_id)
            .field("private", &self.has_private_key())
            .finish_non_exhaustive()
    }
}

/// Unique identifier for a cryptographic key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// Mint a new process-unique key id
    pub fn generate() -> Self {
        KeyId(ulid::Ulid::new().to_string())
    }

    /// Create from string representation
    pub fn from_string(s: impl Into<String>) -> Self {
        KeyId(s.into())
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{shared_key_pair, second_key_pair};

    #[test]
    fn test_generated_key_shape() {
        let keypair = shared_key_pair();

        assert!(keypair.has_private_key());
        assert_eq!(keypair.public_exponent(), vec![0x01, 0x00, 0x01]);
        assert_eq!(keypair.modulus().len(), KEY_BITS / 8);
        assert_ne!(keypair.modulus()[0], 0);
    }

    #[test]
    fn test_key_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| KeyId::generate()).collect();
        assert_eq!(ids.len(), 1000);
        assert_ne!(shared_key_pair().key_id(), second_key_pair().key_id());
    }

    #[test]
    fn test_sign_then_verify() {
        let keypair = shared_key_pair();
        let signature = keypair.sign("test message").unwrap();

        assert_eq!(signature.len(), KEY_BITS / 8);
        assert!(keypair.verify("test message", &signature));
        assert!(!keypair.verify("test messagE", &signature));
    }

    #[test]
    fn test_signatures_are_deterministic() {
        let keypair = shared_key_pair();
        assert_eq!(keypair.sign("same").unwrap(), keypair.sign("same").unwrap());
    }

    #[test]
    fn test_public_only_key_verifies_but_cannot_sign() {
        let keypair = shared_key_pair();
        let signature = keypair.sign("hello").unwrap();

        let public = KeyPair::from_public_components(
            &codec::encode(keypair.public_exponent()),
            &codec::encode(keypair.modulus()),
        )
        .unwrap();

        assert!(!public.has_private_key());
        assert!(public.verify("hello", &signature));
        assert_eq!(public.modulus(), keypair.modulus());
        assert!(matches!(public.sign("hello"), Err(TrustError::MissingPrivateKey(_))));
    }

    #[test]
    fn test_reconstructed_key_gets_fresh_id_until_relabelled() {
        let keypair = shared_key_pair();
        let public = KeyPair::from_public_components(
            &codec::encode(keypair.public_exponent()),
            &codec::encode(keypair.modulus()),
        )
        .unwrap();
        assert_ne!(public.key_id(), keypair.key_id());

        let relabelled = public.with_key_id(keypair.key_id().clone());
        assert_eq!(relabelled.key_id(), keypair.key_id());
    }

    #[test]
    fn test_malformed_signature_is_rejected_not_an_error() {
        let keypair = shared_key_pair();
        assert!(!keypair.verify("hello", b""));
        assert!(!keypair.verify("hello", &[0u8; 7]));
        assert!(!keypair.verify("hello", &[0xffu8; KEY_BITS / 8]));
    }

    #[test]
    fn test_malformed_components_are_errors() {
        assert!(KeyPair::from_public_components("", "AQAB").is_err());
        assert!(KeyPair::from_public_components("AQAB", "!!").is_err());
    }

    #[test]
    fn test_public_key_pem() {
        let pem = shared_key_pair().public_key_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
    }
}
