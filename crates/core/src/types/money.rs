//! Lenient numeric parsing for platform payloads.
//!
//! Platforms send amounts as JSON strings (`"9.99"`), as numbers (`9.99`), or
//! not at all. Two rules apply:
//!
//! - Absent, `null`, and empty values become zero.
//! - A money value that is present but unparsable is an error, so the item
//!   carrying it can be skipped instead of being mirrored with a wrong price.
//!
//! Counters (quantities, order counts) never fail: anything unparsable is zero.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

/// A money field could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unparsable amount: {0:?}")]
pub struct MoneyError(pub String);

/// Parse a money amount from a JSON value.
///
/// # Errors
///
/// Returns [`MoneyError`] when the value is a non-empty string that is not a
/// decimal number, or a JSON type that cannot hold an amount (bool, array,
/// object).
///
/// ```
/// use rust_decimal::Decimal;
/// use serde_json::json;
/// use storesync_core::parse_money;
///
/// assert_eq!(parse_money(Some(&json!("9.99"))).unwrap(), Decimal::new(999, 2));
/// assert_eq!(parse_money(Some(&json!(null))).unwrap(), Decimal::ZERO);
/// assert_eq!(parse_money(None).unwrap(), Decimal::ZERO);
/// assert!(parse_money(Some(&json!("nine dollars"))).is_err());
/// ```
pub fn parse_money(value: Option<&Value>) -> Result<Decimal, MoneyError> {
    match value {
        None | Some(Value::Null) => Ok(Decimal::ZERO),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(Decimal::ZERO);
            }
            parse_decimal(s).ok_or_else(|| MoneyError(s.to_owned()))
        }
        Some(Value::Number(n)) => {
            let s = n.to_string();
            parse_decimal(&s).ok_or(MoneyError(s))
        }
        Some(other) => Err(MoneyError(other.to_string())),
    }
}

/// Parse a count from a JSON value, falling back to zero.
///
/// Fractional values are truncated; negative values are kept as-is so the
/// caller can decide whether they are meaningful (stock can go negative on
/// some platforms).
#[must_use]
pub fn parse_count(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok()?.trunc().to_i64()))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| parse_decimal(s).and_then(|d| d.trunc().to_i64()))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

/// Clamp an amount to zero or above.
///
/// Order amounts and unit prices are non-negative locally even when a
/// platform reports a negative adjustment.
#[must_use]
pub fn non_negative(amount: Decimal) -> Decimal {
    amount.max(Decimal::ZERO)
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}
