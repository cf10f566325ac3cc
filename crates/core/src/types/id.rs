//! External identifiers.
//!
//! Every mirrored record is keyed by the identifier the external platform
//! assigned to it. Platforms disagree on the shape (Shopify sends numbers,
//! POS systems send numeric strings, GraphQL APIs send `gid://` URIs), so the
//! identifier is kept as an opaque string and never interpreted locally.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An identifier assigned by the external platform.
///
/// The join key between the platform's representation of an entity and the
/// local record.
///
/// ```
/// use storesync_core::ExternalId;
/// use serde_json::json;
///
/// assert_eq!(ExternalId::from_json(&json!(123)).unwrap().as_str(), "123");
/// assert_eq!(ExternalId::from_json(&json!("45")).unwrap().as_str(), "45");
/// assert!(ExternalId::from_json(&json!(null)).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    /// Create an external ID from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Read an external ID out of a JSON value.
    ///
    /// Accepts non-empty strings and integers. Returns `None` for anything
    /// else, including `null` and empty strings.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| Self(s.to_owned()))
            }
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self(n.to_string())),
            _ => None,
        }
    }

    /// Get the underlying string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the ID and return its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExternalId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ExternalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for ExternalId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for ExternalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ExternalId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ExternalId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ExternalId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_number() {
        let id = ExternalId::from_json(&json!(632_910_392)).unwrap();
        assert_eq!(id.as_str(), "632910392");
    }

    #[test]
    fn test_from_json_string_is_trimmed() {
        let id = ExternalId::from_json(&json!("  gid://shopify/Product/1 ")).unwrap();
        assert_eq!(id.as_str(), "gid://shopify/Product/1");
    }

    #[test]
    fn test_from_json_rejects_empty_and_non_ids() {
        assert!(ExternalId::from_json(&json!("")).is_none());
        assert!(ExternalId::from_json(&json!("   ")).is_none());
        assert!(ExternalId::from_json(&json!(null)).is_none());
        assert!(ExternalId::from_json(&json!(1.5)).is_none());
        assert!(ExternalId::from_json(&json!({"id": 1})).is_none());
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = ExternalId::new("123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"123\"");
    }
}
