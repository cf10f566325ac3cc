//! Postal addresses attached to customers and orders.

use serde::{Deserialize, Serialize};

/// A postal address as reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: Option<String>,
    pub company: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
    pub zip: Option<String>,
    pub phone: Option<String>,
}

impl Address {
    /// True when no field carries a value.
    ///
    /// Translators use this to store `None` instead of an address made of
    /// nothing but blanks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [
            &self.name,
            &self.company,
            &self.line1,
            &self.line2,
            &self.city,
            &self.province,
            &self.country,
            &self.zip,
            &self.phone,
        ]
        .iter()
        .all(|f| f.as_deref().is_none_or(|s| s.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_address_is_empty() {
        assert!(Address::default().is_empty());
    }

    #[test]
    fn test_blank_fields_count_as_empty() {
        let address = Address {
            city: Some("  ".to_string()),
            ..Address::default()
        };
        assert!(address.is_empty());

        let address = Address {
            city: Some("Ottawa".to_string()),
            ..Address::default()
        };
        assert!(!address.is_empty());
    }
}
