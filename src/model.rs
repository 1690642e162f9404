// src/model.rs

use serde::{Deserialize, Serialize};

/// An issuer's discovery document, found at `.well-known/openid-configuration`.
///
/// Kept as an open mapping; only `jwks_uri` is consumed.
pub type DiscoveryDocument = serde_json::Map<String, serde_json::Value>;

/// Represents a single published signing key (RFC 7517 JWK).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonWebKey {
    pub kid: String,
    #[serde(default)]
    pub kty: String,
    #[serde(rename = "use", default)]
    pub use_purpose: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    /// Base64url-encoded modulus.
    #[serde(default)]
    pub n: Option<String>,
    /// Base64url-encoded public exponent.
    #[serde(default)]
    pub e: Option<String>,
}

/// One snapshot of an issuer's published keys, in the order they were listed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

impl JsonWebKeySet {
    /// Returns the first key whose `kid` equals `kid`.
    pub fn find(&self, kid: &str) -> Option<&JsonWebKey> {
        self.keys.iter().find(|key| key.kid == kid)
    }
}

/// Claims describing the attested workload container.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContainerClaims {
    pub image_reference: String,
    pub image_digest: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Submods {
    pub container: ContainerClaims,
}

/// The payload of a Confidential Space attestation token.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfidentialSpaceClaims {
    pub aud: String,
    pub iss: String,
    pub sub: String,
    pub exp: u64,
    pub submods: Submods,
    pub hwmodel: String,
    pub swname: String,
    pub swversion: Vec<String>,
}
