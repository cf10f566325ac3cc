//! Webhook signature verification.
//!
//! The platform signs every webhook with HMAC-SHA256 over the raw request body
//! and sends the base64 digest in a header (`X-Shopify-Hmac-Sha256`). The
//! digest must be computed over the bytes exactly as received: parsing the
//! JSON and serializing it again changes whitespace and key order, and every
//! signature would then fail.
//!
//! Two secrets can be configured so the shared secret can be rotated without
//! dropping webhooks: a signature valid under either one is accepted.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verifies webhook signatures against the configured shared secrets.
#[derive(Clone)]
pub struct SignatureVerifier {
    primary: SecretString,
    secondary: Option<SecretString>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("primary", &"[REDACTED]")
            .field("secondary", &self.secondary.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl SignatureVerifier {
    /// Create a verifier with a primary and an optional rotation secret.
    #[must_use]
    pub const fn new(primary: SecretString, secondary: Option<SecretString>) -> Self {
        Self { primary, secondary }
    }

    /// Check a base64 signature header against the raw body.
    ///
    /// Returns `false` for a missing, malformed, or mismatched signature. The
    /// digest comparison is constant-time.
    #[must_use]
    pub fn verify(&self, raw_body: &[u8], signature: &str) -> bool {
        let Ok(provided) = BASE64.decode(signature.trim()) else {
            return false;
        };
        if provided.is_empty() {
            return false;
        }

        std::iter::once(&self.primary)
            .chain(self.secondary.as_ref())
            .any(|secret| digest_matches(secret, raw_body, &provided))
    }

    /// Sign a body with the primary secret, returning the base64 digest.
    #[must_use]
    pub fn sign(&self, raw_body: &[u8]) -> String {
        sign_with(&self.primary, raw_body)
    }
}

/// Compute the base64 HMAC-SHA256 of `raw_body` under `secret`.
#[must_use]
pub fn sign_with(secret: &SecretString, raw_body: &[u8]) -> String {
    let mut mac = new_mac(secret);
    mac.update(raw_body);
    BASE64.encode(mac.finalize().into_bytes())
}

fn digest_matches(secret: &SecretString, raw_body: &[u8], provided: &[u8]) -> bool {
    let mut mac = new_mac(secret);
    mac.update(raw_body);
    mac.verify_slice(provided).is_ok()
}

#[allow(clippy::expect_used)]
fn new_mac(secret: &SecretString) -> HmacSha256 {
    // HMAC is defined for keys of any length; new_from_slice never fails here.
    HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .expect("HMAC accepts keys of any length")
}
