// src/client.rs

use crate::error::VerifierError;
use crate::model::{DiscoveryDocument, JsonWebKeySet};
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// A source of the issuer's current key set.
#[async_trait]
pub trait FetchKeySet: Send + Sync {
    /// Returns a snapshot of the issuer's published keys.
    async fn fetch_key_set(&self) -> Result<Arc<JsonWebKeySet>, VerifierError>;

    /// Drops any retained snapshot so the next fetch goes to the network.
    async fn invalidate(&self) {}
}

/// Fetches the key set over HTTP: discovery document first, then `jwks_uri`.
///
/// Every call performs both round trips; nothing is retained between calls.
#[derive(Clone)]
pub struct JwksClient {
    // The client is internally ref-counted to allow for cheap cloning.
    inner: Arc<Inner>,
}

struct Inner {
    http_client: reqwest::Client,
    discovery_url: Url,
}

impl JwksClient {
    /// Creates a new `JwksClient` reading the discovery document at `discovery_url`.
    pub fn new(discovery_url: Url) -> Self {
        Self::with_http_client(reqwest::Client::new(), discovery_url)
    }

    /// Creates a `JwksClient` on top of a caller-configured HTTP client,
    /// e.g. one with request timeouts.
    pub fn with_http_client(http_client: reqwest::Client, discovery_url: Url) -> Self {
        Self {
            inner: Arc::new(Inner {
                http_client,
                discovery_url,
            }),
        }
    }

    /// Determines the JWKS URI from the issuer's discovery document.
    #[instrument(skip(self), fields(url = %self.inner.discovery_url), err)]
    async fn get_jwks_uri(&self) -> Result<Url, VerifierError> {
        let url = &self.inner.discovery_url;
        let discovery_error = |reason: String| VerifierError::Discovery {
            url: url.to_string(),
            reason,
        };

        debug!("Performing discovery at: {}", url);
        let discovery_doc: DiscoveryDocument = self
            .inner
            .http_client
            .get(url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| discovery_error(e.to_string()))?
            .json()
            .await
            .map_err(|e| discovery_error(e.to_string()))?;

        let jwks_uri = discovery_doc
            .get("jwks_uri")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| discovery_error("'jwks_uri' is missing or not a string".to_string()))?;

        let jwks_uri = Url::parse(jwks_uri).map_err(|e| discovery_error(e.to_string()))?;
        debug!("Discovered JWKS URI: {}", jwks_uri);
        Ok(jwks_uri)
    }
}

#[async_trait]
impl FetchKeySet for JwksClient {
    #[instrument(skip(self), err)]
    async fn fetch_key_set(&self) -> Result<Arc<JsonWebKeySet>, VerifierError> {
        let jwks_uri = self.get_jwks_uri().await?;
        let key_set_error = |reason: String| VerifierError::KeySet {
            url: jwks_uri.to_string(),
            reason,
        };

        let jwks: JsonWebKeySet = self
            .inner
            .http_client
            .get(jwks_uri.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| key_set_error(e.to_string()))?
            .json()
            .await
            .map_err(|e| key_set_error(e.to_string()))?;

        debug!("Successfully fetched {} keys.", jwks.keys.len());
        Ok(Arc::new(jwks))
    }
}

/// Reuses the last fetched key set for a bounded time.
///
/// The snapshot is dropped on [`FetchKeySet::invalidate`], which the key
/// resolver calls whenever a `kid` lookup misses.
pub struct CachingKeySetFetcher<F> {
    fetcher: F,
    // Single entry, keyed by unit.
    cache: Cache<(), Arc<JsonWebKeySet>>,
}

impl<F: FetchKeySet> CachingKeySetFetcher<F> {
    /// Wraps `fetcher`, keeping each snapshot for at most `ttl`.
    pub fn new(fetcher: F, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self { fetcher, cache }
    }
}

#[async_trait]
impl<F: FetchKeySet> FetchKeySet for CachingKeySetFetcher<F> {
    async fn fetch_key_set(&self) -> Result<Arc<JsonWebKeySet>, VerifierError> {
        if let Some(key_set) = self.cache.get(&()).await {
            debug!("Key set cache hit.");
            return Ok(key_set);
        }

        debug!("Key set cache miss. Fetching from issuer.");
        let key_set = self.fetcher.fetch_key_set().await?;
        self.cache.insert((), key_set.clone()).await;
        Ok(key_set)
    }

    async fn invalidate(&self) {
        debug!("Invalidating cached key set.");
        self.cache.invalidate(&()).await;
        self.fetcher.invalidate().await;
    }
}
