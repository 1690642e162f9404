// src/validator.rs

use crate::client::{CachingKeySetFetcher, FetchKeySet, JwksClient};
use crate::config::{Config, ValidationDetails};
use crate::error::VerifierError;
use crate::resolver::{KeyResolver, ResolveKey};
use base64::engine::{general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, get_current_timestamp, Algorithm, Validation};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

/// A decoded JSON object: a token header or payload.
pub type ClaimMap = Map<String, Value>;

/// A token whose signature and claims have been verified.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    header: ClaimMap,
    claims: ClaimMap,
}

impl VerifiedToken {
    /// The validated header, including `iss` and `kid`.
    pub fn header(&self) -> &ClaimMap {
        &self.header
    }

    /// The validated payload claims, exactly as signed.
    pub fn claims(&self) -> &ClaimMap {
        &self.claims
    }

    /// Deserializes the payload claims into `T`.
    pub fn claims_as<T: DeserializeOwned>(&self) -> Result<T, VerifierError> {
        serde_json::from_value(Value::Object(self.claims.clone()))
            .map_err(|e| VerifierError::ClaimDeserialization(e.to_string()))
    }
}

/// A parsed token whose signature has not been checked yet.
struct UnverifiedToken<'a> {
    compact: &'a str,
    header: ClaimMap,
    claims: ClaimMap,
}

impl<'a> UnverifiedToken<'a> {
    fn parse(raw: &'a [u8]) -> Result<Self, VerifierError> {
        let compact = std::str::from_utf8(raw)
            .map_err(|_| VerifierError::MalformedToken("token is not valid UTF-8".to_string()))?
            .trim();

        let segments: Vec<&str> = compact.split('.').collect();
        if segments.len() != 3 {
            return Err(VerifierError::MalformedToken(format!(
                "expected 3 dot-separated segments, found {}",
                segments.len()
            )));
        }

        Ok(Self {
            compact,
            header: decode_segment(segments[0], "header")?,
            claims: decode_segment(segments[1], "payload")?,
        })
    }

    fn header_str(&self, name: &str) -> Result<&str, VerifierError> {
        match self.header.get(name) {
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(VerifierError::MalformedToken(format!(
                "header claim '{name}' is not a string"
            ))),
            None => Err(VerifierError::MalformedToken(format!(
                "header claim '{name}' is missing"
            ))),
        }
    }
}

fn decode_segment(segment: &str, name: &str) -> Result<ClaimMap, VerifierError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| VerifierError::MalformedToken(format!("{name} is not base64url: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| VerifierError::MalformedToken(format!("{name} is not a JSON object: {e}")))
}

/// Verifies attestation tokens issued by the single trusted issuer.
///
/// Create one and reuse it for every request. A verification fetches the
/// issuer's keys (unless a key set cache is configured), resolves the key
/// named by the token header, then checks signature, expiry and the
/// configured claim policy.
#[derive(Clone)]
pub struct TokenVerifier {
    trusted_issuer: String,
    validation: ValidationDetails,
    resolver: Arc<dyn ResolveKey>,
}

impl TokenVerifier {
    /// Creates a verifier fetching keys from the configured issuer over HTTP.
    pub fn new(config: Config) -> Self {
        let jwks_client = JwksClient::new(config.discovery_url.clone());
        let fetcher: Arc<dyn FetchKeySet> = match config.key_set_cache_ttl {
            Some(ttl) => Arc::new(CachingKeySetFetcher::new(jwks_client, ttl)),
            None => Arc::new(jwks_client),
        };
        let resolver = KeyResolver::new(config.trusted_issuer.clone(), fetcher);
        Self::with_resolver(config, Arc::new(resolver))
    }

    /// Creates a verifier obtaining keys from `resolver`.
    ///
    /// `config.discovery_url` and `config.key_set_cache_ttl` are not used here;
    /// they belong to whatever `resolver` does.
    pub fn with_resolver(config: Config, resolver: Arc<dyn ResolveKey>) -> Self {
        Self {
            trusted_issuer: config.trusted_issuer,
            validation: config.validation,
            resolver,
        }
    }

    /// Verifies a compact-serialized token.
    ///
    /// 1. Parses the envelope, reads `iss` and `kid` from the header and
    ///    refuses any `alg` other than RS256.
    /// 2. Resolves the public key for that issuer and key identifier.
    /// 3. Checks the RS256 signature, then `exp`/`nbf`, payload `iss` and `aud`.
    /// 4. Applies the exact-match and image digest policies, if configured.
    ///
    /// # Returns
    ///
    /// The verified header and payload claims, or the classified failure.
    #[instrument(skip(self, raw), err)]
    pub async fn verify_token(&self, raw: &[u8]) -> Result<VerifiedToken, VerifierError> {
        let token = UnverifiedToken::parse(raw)?;
        let issuer = token.header_str("iss")?;
        let kid = token.header_str("kid")?;
        let alg = token.header_str("alg")?;
        debug!(issuer, kid, alg, "Parsed token envelope.");

        // Only RS256 keys are published; anything else is refused before key resolution.
        if alg != "RS256" {
            return Err(VerifierError::SignatureInvalid(ErrorKind::InvalidAlgorithm.into()));
        }

        let public_key = self.resolver.resolve_key(issuer, kid).await?;

        let validation = self.build_validation();
        let token_data = decode::<ClaimMap>(token.compact, &public_key.decoding_key(), &validation)
            .map_err(|e| self.classify(e, &token.claims))?;

        self.check_expiry(&token_data.claims)?;
        self.check_claim_policy(&token_data.claims)?;

        debug!("Token verified.");
        Ok(VerifiedToken {
            header: token.header,
            claims: token_data.claims,
        })
    }

    fn build_validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = self.validation.leeway.as_secs();
        validation.validate_nbf = true;
        validation.set_issuer(&[self.trusted_issuer.as_str()]);
        match &self.validation.audiences {
            Some(audiences) => validation.set_audience(audiences.as_slice()),
            None => validation.validate_aud = false,
        }
        validation
    }

    /// Maps a `jsonwebtoken` failure onto the verifier's error kinds.
    fn classify(&self, error: jsonwebtoken::errors::Error, claims: &ClaimMap) -> VerifierError {
        let classified = match error.kind() {
            ErrorKind::ExpiredSignature => Some(VerifierError::ExpiredToken),
            ErrorKind::ImmatureSignature => Some(VerifierError::NotYetValid),
            ErrorKind::InvalidAudience => Some(VerifierError::InvalidAudience),
            ErrorKind::MissingRequiredClaim(claim) => {
                Some(VerifierError::MissingRequiredClaim(claim.clone()))
            }
            ErrorKind::InvalidIssuer => Some(VerifierError::UntrustedIssuer {
                issuer: claims
                    .get("iss")
                    .map(|iss| iss.as_str().map(str::to_string).unwrap_or_else(|| iss.to_string()))
                    .unwrap_or_default(),
                expected: self.trusted_issuer.clone(),
            }),
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                Some(VerifierError::MalformedToken(error.to_string()))
            }
            _ => None,
        };
        match classified {
            Some(classified) => classified,
            None => VerifierError::SignatureInvalid(error),
        }
    }

    /// Rejects a token once the current time reaches `exp` (plus leeway).
    fn check_expiry(&self, claims: &ClaimMap) -> Result<(), VerifierError> {
        let Some(exp) = claims.get("exp").and_then(Value::as_u64) else {
            return Ok(());
        };
        if get_current_timestamp() >= exp.saturating_add(self.validation.leeway.as_secs()) {
            return Err(VerifierError::ExpiredToken);
        }
        Ok(())
    }

    fn check_claim_policy(&self, claims: &ClaimMap) -> Result<(), VerifierError> {
        if let Some(exact_match_claims) = &self.validation.exact_match_claims {
            for (claim_name, expected_value) in exact_match_claims {
                let actual_value = claims.get(claim_name).cloned().unwrap_or(Value::Null);
                if &actual_value != expected_value {
                    debug!("Claim value mismatch for '{}'.", claim_name);
                    return Err(VerifierError::ClaimValueMismatch {
                        claim: claim_name.clone(),
                        expected: expected_value.clone(),
                        actual: actual_value,
                    });
                }
            }
        }

        if let Some(expected_digest) = &self.validation.expected_image_digest {
            let actual_value = claims
                .get("submods")
                .and_then(|submods| submods.get("container"))
                .and_then(|container| container.get("image_digest"))
                .cloned()
                .unwrap_or(Value::Null);
            if actual_value.as_str() != Some(expected_digest.as_str()) {
                return Err(VerifierError::ClaimValueMismatch {
                    claim: "submods.container.image_digest".to_string(),
                    expected: Value::String(expected_digest.clone()),
                    actual: actual_value,
                });
            }
        }

        Ok(())
    }
}
