// src/error.rs

use base64::DecodeError;
use thiserror::Error;

/// The step of a verification that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Parsing the token framing and header.
    Envelope,
    /// Checking the token's issuer against the trusted issuer.
    Issuer,
    /// Fetching or parsing the discovery document.
    Discovery,
    /// Fetching or parsing the key set.
    KeySet,
    /// Looking up the key identifier in the key set.
    KeyLookup,
    /// Reconstructing the public key from its encoded components.
    KeyDecode,
    /// Checking the signature.
    Signature,
    /// Checking time-based and policy claims.
    Claims,
    /// Building the verifier configuration.
    Configuration,
}

/// The primary error type for the `attestation-token-verifier` library.
#[derive(Debug, Error)]
pub enum VerifierError {
    /// A base64url-encoded integer could not be decoded.
    #[error("Base64URL decoding error: {0}")]
    Decode(#[from] DecodeError),

    /// The discovery document could not be fetched, parsed, or lacks `jwks_uri`.
    #[error("Discovery document error at {url}: {reason}")]
    Discovery { url: String, reason: String },

    /// The key set could not be fetched or parsed.
    #[error("Key set error at {url}: {reason}")]
    KeySet { url: String, reason: String },

    /// The token names an issuer other than the configured trusted issuer.
    #[error("Untrusted issuer '{issuer}', expected '{expected}'")]
    UntrustedIssuer { issuer: String, expected: String },

    /// No key in the fetched key set carries the requested `kid`.
    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),

    /// The matched key's `n` or `e` component could not be decoded.
    #[error("Invalid key material for kid '{kid}', component '{component}': {reason}")]
    KeyDecode {
        kid: String,
        component: &'static str,
        reason: String,
    },

    /// The token envelope or its required header claims are malformed.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// The signature is valid but the token has expired.
    #[error("Token has expired")]
    ExpiredToken,

    /// The signature does not validate against the resolved key.
    #[error("Invalid token signature: {0}")]
    SignatureInvalid(#[source] jsonwebtoken::errors::Error),

    /// The token's `nbf` claim lies in the future.
    #[error("Token is not valid yet")]
    NotYetValid,

    /// The token's `aud` claim does not name this verifier.
    #[error("Token audience does not match the configured audience")]
    InvalidAudience,

    /// A required claim is missing from the token.
    #[error("A required claim is missing from the token: {0}")]
    MissingRequiredClaim(String),

    /// A claim's value does not match the expected value.
    #[error("Claim '{claim}' value mismatch. Expected: {expected}, Actual: {actual}")]
    ClaimValueMismatch {
        claim: String,
        expected: serde_json::Value,
        actual: serde_json::Value,
    },

    /// Failed to deserialize the verified claims into the target type.
    #[error("Failed to deserialize claims: {0}")]
    ClaimDeserialization(String),

    /// A provided URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl VerifierError {
    /// Returns the verification step that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            VerifierError::Decode(_) | VerifierError::KeyDecode { .. } => Stage::KeyDecode,
            VerifierError::Discovery { .. } => Stage::Discovery,
            VerifierError::KeySet { .. } => Stage::KeySet,
            VerifierError::UntrustedIssuer { .. } => Stage::Issuer,
            VerifierError::KeyNotFound(_) => Stage::KeyLookup,
            VerifierError::MalformedToken(_) => Stage::Envelope,
            VerifierError::SignatureInvalid(_) => Stage::Signature,
            VerifierError::ExpiredToken
            | VerifierError::NotYetValid
            | VerifierError::InvalidAudience
            | VerifierError::MissingRequiredClaim(_)
            | VerifierError::ClaimValueMismatch { .. }
            | VerifierError::ClaimDeserialization(_) => Stage::Claims,
            VerifierError::InvalidUrl(_) => Stage::Configuration,
        }
    }
}
