// src/lib.rs

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod resolver;
pub mod validator;

/// The public prelude for the `attestation-token-verifier` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    pub use crate::client::{CachingKeySetFetcher, FetchKeySet, JwksClient};
    pub use crate::config::{Config, ConfigBuilder, DEFAULT_TRUSTED_ISSUER};
    pub use crate::error::{Stage, VerifierError};
    pub use crate::model::{ConfidentialSpaceClaims, JsonWebKey, JsonWebKeySet};
    pub use crate::resolver::{KeyResolver, PublicKey, ResolveKey};
    pub use crate::validator::{TokenVerifier, VerifiedToken};
}
