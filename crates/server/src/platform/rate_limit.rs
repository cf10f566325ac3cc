//! Rate-limit handling shared by the platform clients.
//!
//! Both platforms meter API use with a leaky bucket and report its level on
//! every response (`X-Shopify-Shop-Api-Call-Limit: 32/40`,
//! `X-LS-API-Bucket-Level: 12.5/60`). When the bucket is nearly full the next
//! call is delayed briefly. A 429 is retried after `Retry-After`, a bounded
//! number of times.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};

use super::PlatformError;

/// Retries after a 429 before giving up.
pub const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Delay applied when the bucket is nearly full.
pub const NEARLY_FULL_PAUSE: Duration = Duration::from_secs(1);

/// Delay used when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(2);

/// Upper bound on a single `Retry-After` wait.
const MAX_RETRY_AFTER_SECS: f64 = 60.0;

/// Bucket fill ratio at which calls are slowed down.
const NEARLY_FULL_RATIO: f64 = 0.8;

/// A parsed call-limit header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallLimit {
    pub used: f64,
    pub max: f64,
}

impl CallLimit {
    /// Parse `used/max`; `None` for anything malformed.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let (used, max) = value.trim().split_once('/')?;
        let used = used.trim().parse::<f64>().ok()?;
        let max = max.trim().parse::<f64>().ok()?;
        (max > 0.0 && used >= 0.0).then_some(Self { used, max })
    }

    #[must_use]
    pub fn is_nearly_full(&self) -> bool {
        self.used / self.max >= NEARLY_FULL_RATIO
    }
}

/// How long a 429 response asks the caller to wait.
#[must_use]
pub fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map_or(DEFAULT_RETRY_AFTER, |secs| {
            Duration::from_secs_f64(secs.min(MAX_RETRY_AFTER_SECS))
        })
}

/// Send a request, honoring 429s and the call-limit header.
///
/// `build` is called once per attempt because a sent `RequestBuilder` cannot
/// be reused.
///
/// # Errors
///
/// Returns `PlatformError::RateLimited` once the retries are exhausted, or
/// `PlatformError::Http` if the request cannot be sent.
pub async fn send_throttled<F>(build: F, limit_header: &str) -> Result<Response, PlatformError>
where
    F: Fn() -> RequestBuilder + Send + Sync,
{
    let mut attempt = 0;
    loop {
        let response = build().send().await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let wait = retry_after(response.headers());
            if attempt >= MAX_RATE_LIMIT_RETRIES {
                return Err(PlatformError::RateLimited(wait.as_secs().max(1)));
            }
            attempt += 1;
            tracing::warn!(
                attempt,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "Rate limited by platform, retrying"
            );
            tokio::time::sleep(wait).await;
            continue;
        }

        let limit = response
            .headers()
            .get(limit_header)
            .and_then(|v| v.to_str().ok())
            .and_then(CallLimit::parse);
        if let Some(limit) = limit.filter(CallLimit::is_nearly_full) {
            tracing::debug!(used = limit.used, max = limit.max, "Call-limit bucket nearly full");
            tokio::time::sleep(NEARLY_FULL_PAUSE).await;
        }

        return Ok(response);
    }
}
