// src/bin/verify_token.rs

//! Verifies an attestation token read from a file.
//!
//! Usage: `verify-token [TOKEN_FILE] [AUDIENCE]`. `TOKEN_FILE` defaults to `JWTtoken`.

use attestation_token_verifier::prelude::*;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_TOKEN_FILENAME: &str = "JWTtoken";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let token_path = args.next().unwrap_or_else(|| DEFAULT_TOKEN_FILENAME.to_string());
    let audience = args.next();

    let raw = match std::fs::read(&token_path) {
        Ok(raw) => raw,
        Err(e) => {
            error!("Failed to read token file '{}': {}", token_path, e);
            return ExitCode::FAILURE;
        }
    };

    let mut builder = ConfigBuilder::new();
    if let Some(audience) = &audience {
        builder = builder.audience(audience);
    }
    let config = match builder.build() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let verifier = TokenVerifier::new(config);
    let verified = match verifier.verify_token(&raw).await {
        Ok(verified) => verified,
        Err(e) => {
            error!(stage = ?e.stage(), "Token rejected: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Verified claims: {}", serde_json::Value::Object(verified.claims().clone()));
    match verified.claims_as::<ConfidentialSpaceClaims>() {
        Ok(claims) => {
            info!("image reference {}", claims.submods.container.image_reference);
            info!("image digest {}", claims.submods.container.image_digest);
        }
        Err(e) => info!("Token does not carry container claims: {}", e),
    }
    ExitCode::SUCCESS
}
