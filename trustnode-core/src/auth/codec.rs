//! URL-safe, unpadded base64
//!
//! Tokens, signatures and key directory components all travel in this form.
//! Decoding tolerates padded input so values produced by other encoders are
//! accepted as long as they are otherwise valid.

use crate::Result;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as base64url without padding
pub fn encode(input: impl AsRef<[u8]>) -> String {
    URL_SAFE_LENIENT.encode(input)
}

/// Decode base64url, with or without trailing padding
pub fn decode(input: &str) -> Result<Vec<u8>> {
    Ok(URL_SAFE_LENIENT.decode(input)?)
}

/// Decode base64url into a UTF-8 string
pub fn decode_to_string(input: &str) -> Result<String> {
    let bytes = decode(input)?;
    String::from_utf8(bytes)
        .map_err(|e| crate::TrustError::InvalidToken(format!("segment is not UTF-8: {}", e)))
}
