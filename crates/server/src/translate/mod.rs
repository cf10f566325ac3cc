//! Entity translators: platform JSON to canonical records.
//!
//! Pure functions, one set per platform. Translators never fail on missing
//! data; they substitute defaults (`"Unknown"` brand, `"Uncategorized"`
//! category, placeholder image, empty lists, zero amounts). They fail only
//! when a payload is not an object, has no ID, or carries a money value that
//! cannot be read, so that one bad item can be skipped without mirroring a
//! wrong price.

mod fields;
pub mod lightspeed;
pub mod shopify;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use storesync_core::{EntityKind, MoneyError, Record};

use crate::platform::Platform;

/// Products created within this many days are flagged as new.
pub const NEW_PRODUCT_DAYS: i64 = 30;

/// Tag that marks a product as featured.
pub const FEATURED_TAG: &str = "featured";

/// Errors that make a single payload untranslatable.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("{0} payload is not a JSON object")]
    NotAnObject(EntityKind),

    #[error("{0} payload has no id")]
    MissingId(EntityKind),

    #[error("invalid amount in '{field}': {source}")]
    InvalidAmount {
        field: &'static str,
        #[source]
        source: MoneyError,
    },

    /// Platform numbers whose sum or product does not fit in a `Decimal`.
    #[error("amount in '{field}' overflows")]
    Overflow { field: &'static str },
}

/// Translate one platform payload into a canonical record.
///
/// `now` anchors time-relative flags such as "new".
///
/// # Errors
///
/// Returns `TranslationError` if the payload cannot be mirrored.
pub fn translate(
    platform: Platform,
    kind: EntityKind,
    payload: &Value,
    now: DateTime<Utc>,
) -> Result<Record, TranslationError> {
    if !payload.is_object() {
        return Err(TranslationError::NotAnObject(kind));
    }

    let record = match (platform, kind) {
        (Platform::Shopify, EntityKind::Product) => shopify::product(payload, now)?.into(),
        (Platform::Shopify, EntityKind::Customer) => shopify::customer(payload)?.into(),
        (Platform::Shopify, EntityKind::Order) => shopify::order(payload)?.into(),
        (Platform::Lightspeed, EntityKind::Product) => lightspeed::item(payload, now)?.into(),
        (Platform::Lightspeed, EntityKind::Customer) => lightspeed::customer(payload)?.into(),
        (Platform::Lightspeed, EntityKind::Order) => lightspeed::sale(payload)?.into(),
    };
    Ok(record)
}
