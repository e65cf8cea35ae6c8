//! Constant-time comparisons
//!
//! Key ids and other token-derived strings are compared without early exit.

use subtle::ConstantTimeEq;

/// Constant-time byte comparison; lengths are not secret
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}

/// Constant-time string comparison (key ids, tokens)
pub fn constant_time_str_compare(a: &str, b: &str) -> bool {
    constant_time_compare(a.as_bytes(), b.as_bytes())
}
