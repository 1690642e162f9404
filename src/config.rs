// src/config.rs

use crate::error::VerifierError;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// The issuer of Confidential Space attestation tokens.
pub const DEFAULT_TRUSTED_ISSUER: &str = "https://confidentialcomputing.googleapis.com";

/// Path of the discovery document relative to the issuer.
pub const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// Contains the claim checks applied to a token once its signature is verified.
#[derive(Clone, Debug, Default)]
pub struct ValidationDetails {
    /// The tolerance for clock skew when validating `exp` and `nbf`.
    /// Defaults to zero.
    pub leeway: Duration,
    /// Accepted values for the `aud` claim. When `None`, the audience is not checked.
    pub audiences: Option<Vec<String>>,
    /// Top-level claims that must be present with exactly these values.
    pub exact_match_claims: Option<HashMap<String, serde_json::Value>>,
    /// Expected value of `submods.container.image_digest`.
    pub expected_image_digest: Option<String>,
}

/// The verifier configuration.
///
/// Holds the single trusted issuer, where its discovery document lives, and
/// the claim policy. Construct it with [`ConfigBuilder`], which trusts the
/// Confidential Space issuer unless told otherwise.
#[derive(Clone, Debug)]
pub struct Config {
    /// The only issuer whose tokens are accepted. Compared exactly against the `iss` claim.
    pub trusted_issuer: String,
    /// Where the issuer's discovery document is fetched from.
    pub discovery_url: Url,
    /// The claim checks applied after signature verification.
    pub validation: ValidationDetails,
    /// How long a fetched key set may be reused. `None` fetches on every call.
    pub key_set_cache_ttl: Option<Duration>,
}

/// Builds the discovery URL for an issuer: the issuer base plus the well-known path.
pub fn discovery_url_for(issuer: &str) -> Result<Url, VerifierError> {
    let base = issuer.trim_end_matches('/');
    Url::parse(&format!("{base}{WELL_KNOWN_PATH}"))
        .map_err(|e| VerifierError::InvalidUrl(e.to_string()))
}

/// A builder for creating a `Config` instance.
#[derive(Default)]
pub struct ConfigBuilder {
    trusted_issuer: Option<String>,
    discovery_url: Option<Url>,
    key_set_cache_ttl: Option<Duration>,
    validation: ValidationDetails,
}

impl ConfigBuilder {
    /// Creates a new `ConfigBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the trusted issuer. Defaults to [`DEFAULT_TRUSTED_ISSUER`].
    pub fn trusted_issuer(mut self, issuer: &str) -> Self {
        self.trusted_issuer = Some(issuer.to_string());
        self
    }

    /// Overrides the discovery document location instead of deriving it from the issuer.
    pub fn discovery_url(mut self, url: &str) -> Result<Self, VerifierError> {
        let parsed_url = Url::parse(url).map_err(|e| VerifierError::InvalidUrl(e.to_string()))?;
        self.discovery_url = Some(parsed_url);
        Ok(self)
    }

    /// Adds an accepted audience. Once any audience is set, `aud` is required to match.
    pub fn audience(mut self, audience: &str) -> Self {
        self.validation
            .audiences
            .get_or_insert_with(Vec::new)
            .push(audience.to_string());
        self
    }

    /// Sets the clock skew tolerance.
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.validation.leeway = leeway;
        self
    }

    /// Requires the given top-level claims to equal the given values.
    pub fn assert_claims(mut self, claims: HashMap<String, serde_json::Value>) -> Self {
        self.validation.exact_match_claims = Some(claims);
        self
    }

    /// Requires the attested container image to have this digest.
    pub fn expected_image_digest(mut self, digest: &str) -> Self {
        self.validation.expected_image_digest = Some(digest.to_string());
        self
    }

    /// Reuses a fetched key set for up to `ttl`.
    pub fn key_set_cache_ttl(mut self, ttl: Duration) -> Self {
        self.key_set_cache_ttl = Some(ttl);
        self
    }

    /// Consumes the builder and returns a `Config` object.
    ///
    /// # Errors
    ///
    /// Returns an error if the discovery URL cannot be derived from the issuer.
    pub fn build(self) -> Result<Config, VerifierError> {
        let trusted_issuer = self
            .trusted_issuer
            .unwrap_or_else(|| DEFAULT_TRUSTED_ISSUER.to_string());
        let discovery_url = match self.discovery_url {
            Some(url) => url,
            None => discovery_url_for(&trusted_issuer)?,
        };

        Ok(Config {
            trusted_issuer,
            discovery_url,
            validation: self.validation,
            key_set_cache_ttl: self.key_set_cache_ttl,
        })
    }
}
