// src/resolver.rs

use crate::client::FetchKeySet;
use crate::codec::{decode_biguint, decode_exponent};
use crate::error::VerifierError;
use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use rsa::BigUint;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// An RSA public key rebuilt from a published key record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub n: BigUint,
    pub e: u64,
}

impl PublicKey {
    /// Converts the key into a `jsonwebtoken` decoding key.
    ///
    /// Both components are re-encoded minimally; leading zero octets in the
    /// published encoding are dropped.
    pub fn decoding_key(&self) -> DecodingKey {
        let e = BigUint::from(self.e);
        DecodingKey::from_rsa_raw_components(&self.n.to_bytes_be(), &e.to_bytes_be())
    }
}

/// Supplies the verification key for a token's issuer and key identifier.
#[async_trait]
pub trait ResolveKey: Send + Sync {
    async fn resolve_key(&self, issuer: &str, kid: &str) -> Result<PublicKey, VerifierError>;
}

/// Resolves keys for a single trusted issuer from its published key set.
#[derive(Clone)]
pub struct KeyResolver {
    trusted_issuer: String,
    fetcher: Arc<dyn FetchKeySet>,
}

impl KeyResolver {
    /// Creates a resolver trusting only `trusted_issuer`, fetching keys through `fetcher`.
    pub fn new(trusted_issuer: impl Into<String>, fetcher: Arc<dyn FetchKeySet>) -> Self {
        Self {
            trusted_issuer: trusted_issuer.into(),
            fetcher,
        }
    }
}

#[async_trait]
impl ResolveKey for KeyResolver {
    #[instrument(skip(self), err)]
    async fn resolve_key(&self, issuer: &str, kid: &str) -> Result<PublicKey, VerifierError> {
        // Checked before any network call.
        if issuer != self.trusted_issuer {
            return Err(VerifierError::UntrustedIssuer {
                issuer: issuer.to_string(),
                expected: self.trusted_issuer.clone(),
            });
        }

        let key_set = self.fetcher.fetch_key_set().await?;

        // First match wins; duplicate kids are not rejected.
        let Some(jwk) = key_set.find(kid) else {
            warn!("No key with kid '{}' among {} published keys.", kid, key_set.keys.len());
            self.fetcher.invalidate().await;
            return Err(VerifierError::KeyNotFound(kid.to_string()));
        };

        let key_decode_error = |component: &'static str, reason: String| VerifierError::KeyDecode {
            kid: kid.to_string(),
            component,
            reason,
        };

        let n = jwk
            .n
            .as_deref()
            .ok_or_else(|| key_decode_error("n", "missing".to_string()))?;
        let e = jwk
            .e
            .as_deref()
            .ok_or_else(|| key_decode_error("e", "missing".to_string()))?;

        let n = decode_biguint(n).map_err(|err| key_decode_error("n", err.to_string()))?;
        let e = decode_exponent(e).map_err(|err| key_decode_error("e", err.to_string()))?;

        if n.bits() == 0 {
            return Err(key_decode_error("n", "zero modulus".to_string()));
        }
        if e == 0 {
            return Err(key_decode_error("e", "zero exponent".to_string()));
        }

        debug!("Resolved {}-bit key for kid: {}", n.bits(), kid);
        Ok(PublicKey { n, e })
    }
}
