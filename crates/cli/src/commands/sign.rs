//! Webhook body signing, for manual test deliveries.
//!
//! ```bash
//! BODY=body.json
//! SIG=$(storesync sign --secret-env WEBHOOK_SECRET "$BODY")
//! curl -X POST http://localhost:3002/webhook \
//!   -H "X-Shopify-Topic: products/update" \
//!   -H "X-Shopify-Hmac-Sha256: $SIG" \
//!   --data-binary @"$BODY"
//! ```

use std::path::Path;

use secrecy::SecretString;
use thiserror::Error;

use storesync_server::signature::sign_with;

#[derive(Debug, Error)]
pub enum SignError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Sign the exact bytes of `file` with the secret held in `secret_env`.
pub fn sign_file(secret_env: &str, file: &Path) -> Result<String, SignError> {
    dotenvy::dotenv().ok();

    let secret = std::env::var(secret_env)
        .ok()
        .filter(|s| !s.is_empty())
        .map(SecretString::from)
        .ok_or_else(|| SignError::MissingEnvVar(secret_env.to_owned()))?;

    let body = std::fs::read(file).map_err(|source| SignError::Read {
        path: file.display().to_string(),
        source,
    })?;

    Ok(sign_with(&secret, &body))
}
