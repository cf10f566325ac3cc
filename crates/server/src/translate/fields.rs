//! Field readers shared by the translators.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use storesync_core::{Email, EntityKind, ExternalId, LineItem, parse_count, parse_money};

use super::TranslationError;

/// Read the entity ID under `key`.
pub fn id(value: &Value, key: &str, kind: EntityKind) -> Result<ExternalId, TranslationError> {
    value
        .get(key)
        .and_then(ExternalId::from_json)
        .ok_or(TranslationError::MissingId(kind))
}

/// Read an optional ID where `"0"` means "none" (Lightspeed convention).
pub fn optional_id(value: Option<&Value>) -> Option<ExternalId> {
    value
        .and_then(ExternalId::from_json)
        .filter(|id| id.as_str() != "0")
}

/// A trimmed, non-empty string. Numbers are accepted and rendered as text.
pub fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn text_or(value: Option<&Value>, default: &str) -> String {
    text(value).unwrap_or_else(|| default.to_string())
}

/// A money amount; absent, null, and empty are zero.
pub fn money(value: Option<&Value>, field: &'static str) -> Result<Decimal, TranslationError> {
    parse_money(value).map_err(|source| TranslationError::InvalidAmount { field, source })
}

/// A money amount that may be unset.
pub fn optional_money(
    value: Option<&Value>,
    field: &'static str,
) -> Result<Option<Decimal>, TranslationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(_) => money(value, field).map(Some),
    }
}

pub fn count(value: Option<&Value>) -> i64 {
    parse_count(value)
}

/// Total stock across variants or shops. Saturates instead of wrapping, so
/// absurd platform counts still read as in stock.
pub fn total_stock(quantities: impl IntoIterator<Item = i64>) -> i64 {
    quantities.into_iter().fold(0, i64::saturating_add)
}

/// Sum money amounts, failing instead of panicking on overflow.
pub fn money_sum(
    amounts: impl IntoIterator<Item = Decimal>,
    field: &'static str,
) -> Result<Decimal, TranslationError> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .ok_or(TranslationError::Overflow { field })
}

/// A line item, with overflow of the computed total reported against `field`.
pub fn line_item(
    name: String,
    quantity: i64,
    unit_price: Decimal,
    line_total: Option<Decimal>,
    field: &'static str,
) -> Result<LineItem, TranslationError> {
    LineItem::new(name, quantity, unit_price, line_total)
        .ok_or(TranslationError::Overflow { field })
}

/// A boolean that may be sent as `true` or `"true"`.
pub fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// An RFC 3339 timestamp; unparsable values are dropped.
pub fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let raw = value?.as_str()?;
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

/// A tag set from a comma-separated string or an array of strings.
pub fn tags(value: Option<&Value>) -> BTreeSet<String> {
    match value {
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items.iter().filter_map(|t| text(Some(t))).collect(),
        _ => BTreeSet::new(),
    }
}

/// An email address; malformed addresses are dropped.
pub fn email(value: Option<&Value>) -> Option<Email> {
    let raw = text(value)?;
    match Email::parse(&raw) {
        Ok(email) => Some(email),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed email");
            None
        }
    }
}

/// Items of a list that may be serialized as a bare object when it has one
/// element.
pub fn one_or_many(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => vec![],
        Some(item) => vec![item],
    }
}

/// Whether a product created at `created_at` counts as new at `now`.
///
/// This is the one translated field that depends on the clock rather than
/// the payload: the same payload translated on either side of the
/// `NEW_PRODUCT_DAYS` boundary yields records that differ in `is_new`.
/// Upserts stay idempotent for a fixed `now`.
pub fn is_recent(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    created_at.is_some_and(|created| {
        created <= now && now - created <= chrono::Duration::days(super::NEW_PRODUCT_DAYS)
    })
}

pub fn is_featured(tags: &BTreeSet<String>) -> bool {
    tags.iter()
        .any(|t| t.eq_ignore_ascii_case(super::FEATURED_TAG))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_total_stock_saturates() {
        assert_eq!(total_stock([i64::MAX, 1]), i64::MAX);
        assert_eq!(total_stock([3, -1, 5]), 7);
        assert_eq!(total_stock([]), 0);
    }

    #[test]
    fn test_money_sum_reports_overflow() {
        assert_eq!(
            money_sum([Decimal::new(150, 2), Decimal::new(250, 2)], "shipping_lines.price").unwrap(),
            Decimal::new(400, 2)
        );
        assert!(matches!(
            money_sum([Decimal::MAX, Decimal::ONE], "shipping_lines.price"),
            Err(TranslationError::Overflow { field: "shipping_lines.price" })
        ));
    }

    #[test]
    fn test_is_recent_depends_on_now() {
        let created = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let before = created + chrono::Duration::days(super::super::NEW_PRODUCT_DAYS);
        let after = before + chrono::Duration::seconds(1);
        assert!(is_recent(Some(created), before));
        assert!(!is_recent(Some(created), after));
    }

    #[test]
    fn test_text_trims_and_drops_blanks() {
        assert_eq!(text(Some(&json!("  Mop "))).as_deref(), Some("Mop"));
        assert_eq!(text(Some(&json!("   "))), None);
        assert_eq!(text(Some(&json!(42))).as_deref(), Some("42"));
        assert_eq!(text(Some(&json!(null))), None);
        assert_eq!(text(None), None);
    }

    #[test]
    fn test_optional_money() {
        assert_eq!(optional_money(None, "p").unwrap(), None);
        assert_eq!(optional_money(Some(&json!("")), "p").unwrap(), None);
        assert_eq!(
            optional_money(Some(&json!("12.50")), "p").unwrap(),
            Some(Decimal::new(1250, 2))
        );
        assert!(optional_money(Some(&json!("twelve")), "p").is_err());
    }

    #[test]
    fn test_tags_from_string_or_array() {
        let from_string = tags(Some(&json!("eco, featured ,, mops")));
        assert_eq!(
            from_string.into_iter().collect::<Vec<_>>(),
            vec!["eco", "featured", "mops"]
        );

        let from_array = tags(Some(&json!(["a", " b ", ""])));
        assert_eq!(from_array.len(), 2);
        assert!(tags(None).is_empty());
    }

    #[test]
    fn test_flag() {
        assert!(flag(Some(&json!(true))));
        assert!(flag(Some(&json!("true"))));
        assert!(!flag(Some(&json!("false"))));
        assert!(!flag(None));
    }

    #[test]
    fn test_timestamp() {
        let t = timestamp(Some(&json!("2026-03-01T10:00:00-05:00"))).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2026, 3, 1, 15, 0, 0).unwrap());
        assert_eq!(timestamp(Some(&json!("yesterday"))), None);
    }

    #[test]
    fn test_one_or_many() {
        assert_eq!(one_or_many(Some(&json!([1, 2]))).len(), 2);
        assert_eq!(one_or_many(Some(&json!({ "a": 1 }))).len(), 1);
        assert!(one_or_many(None).is_empty());
    }

    #[test]
    fn test_optional_id_zero_is_none() {
        assert_eq!(optional_id(Some(&json!("0"))), None);
        assert_eq!(optional_id(Some(&json!("17"))), Some(ExternalId::new("17")));
    }

    #[test]
    fn test_is_recent() {
        let now = Utc.with_ymd_and_hms(2026, 6, 30, 0, 0, 0).unwrap();
        assert!(is_recent(Some(now - chrono::Duration::days(3)), now));
        assert!(!is_recent(Some(now - chrono::Duration::days(31)), now));
        assert!(!is_recent(None, now));
    }
}
