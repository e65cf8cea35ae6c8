//! Property-based tests for trustnode core

use proptest::prelude::*;
use trustnode_core::auth::{codec, Jwt, KeyPair};
use trustnode_core::test_utils::{second_key_pair, shared_key_arc, shared_key_pair};

proptest! {
    #[test]
    fn props_codec_decode_inverts_encode(
        data in prop::collection::vec(any::<u8>(), 0..=256)
    ) {
        let encoded = codec::encode(&data);

        prop_assert!(!encoded.contains('='));
        prop_assert!(!encoded.contains('+'));
        prop_assert!(!encoded.contains('/'));
        prop_assert_eq!(codec::decode(&encoded).unwrap(), data);
    }

    #[test]
    fn props_signature_verifies_only_its_message(
        message in ".{0,200}",
        flip in any::<prop::sample::Index>(),
    ) {
        let key = shared_key_pair();
        let signature = key.sign(&message).unwrap();
        prop_assert!(key.verify(&message, &signature));

        // flip one byte of the signature
        let mut bad_signature = signature.clone();
        let i = flip.index(bad_signature.len());
        bad_signature[i] ^= 0x01;
        prop_assert!(!key.verify(&message, &bad_signature));

        // alter one byte of the message
        if !message.is_empty() {
            let mut bytes = message.clone().into_bytes();
            let i = flip.index(bytes.len());
            bytes[i] ^= 0x01;
            if let Ok(altered) = String::from_utf8(bytes) {
                prop_assert!(!key.verify(&altered, &signature));
            }
        }

        prop_assert!(!second_key_pair().verify(&message, &signature));
    }

    #[test]
    fn props_token_roundtrip_preserves_claims(
        issuer in "http://[a-z]{1,12}:[0-9]{2,5}",
        audience in "http://[a-z]{1,12}:[0-9]{2,5}",
        now in 0u64..4_000_000_000,
    ) {
        let token = Jwt::for_target(&issuer, &audience, shared_key_arc(), now);
        let parsed = Jwt::parse(&token.pack().unwrap()).unwrap();

        prop_assert_eq!(&parsed.header, token.header());
        prop_assert_eq!(&parsed.payload, token.payload());
        prop_assert!(parsed.verify_with(shared_key_pair()));
    }
}

fn rebuild(exponent: &[u8], modulus: &[u8]) -> Option<KeyPair> {
    KeyPair::from_public_components(&codec::encode(exponent), &codec::encode(modulus)).ok()
}

#[test]
fn altered_modulus_or_exponent_fails_verification() {
    let key = shared_key_pair();
    let signature = key.sign("payload").unwrap();
    let exponent = key.public_exponent();
    let modulus = key.modulus();

    for i in [0, 1, modulus.len() / 2, modulus.len() - 1] {
        let mut altered = modulus.clone();
        altered[i] ^= 0x04;
        if let Some(public) = rebuild(&exponent, &altered) {
            assert!(!public.verify("payload", &signature), "modulus byte {} altered", i);
        }
    }

    for i in 0..exponent.len() {
        let mut altered = exponent.clone();
        altered[i] ^= 0x02;
        if let Some(public) = rebuild(&altered, &modulus) {
            assert!(!public.verify("payload", &signature), "exponent byte {} altered", i);
        }
    }

    let public = rebuild(&exponent, &modulus).unwrap();
    assert!(public.verify("payload", &signature));
}

#[test]
fn packed_token_verifies_with_independent_rs256_implementation() {
    use jwt_simple::prelude::*;

    let key = shared_key_arc();
    let now = trustnode_core::unix_now();
    let compact = trustnode_core::auth::Jwt::for_target("http://node-a:1", "http://node-b:2", key.clone(), now)
        .pack()
        .unwrap();

    let public = RS256PublicKey::from_components(&key.modulus(), &key.public_exponent()).unwrap();
    let claims = public.verify_token::<NoCustomClaims>(&compact, None).unwrap();

    assert_eq!(claims.issuer.as_deref(), Some("http://node-a:1"));
    assert_eq!(claims.subject.as_deref(), Some("http://node-a:1"));
}
