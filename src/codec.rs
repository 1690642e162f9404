// src/codec.rs

use crate::error::VerifierError;
use base64::engine::{general_purpose::URL_SAFE_NO_PAD, Engine};
use rsa::BigUint;

/// Decodes an unpadded base64url string holding a big-endian unsigned integer.
pub fn decode_biguint(encoded: &str) -> Result<BigUint, VerifierError> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded)?;
    Ok(BigUint::from_bytes_be(&bytes))
}

/// Decodes a base64url integer and keeps its low 64 bits.
///
/// RSA public exponents fit comfortably; wider values are truncated.
pub fn decode_exponent(encoded: &str) -> Result<u64, VerifierError> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded)?;
    let low = &bytes[bytes.len().saturating_sub(8)..];
    Ok(low.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}
