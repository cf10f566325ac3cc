//! Status enums for mirrored orders.

use serde::{Deserialize, Serialize};

/// Order payment/lifecycle status.
///
/// A closed set; platform values outside it are mapped by
/// [`OrderStatus::from_platform`]. Stored as text (see [`OrderStatus::as_str`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Authorized,
    Paid,
    PartiallyPaid,
    Refunded,
    Voided,
    Cancelled,
}

impl OrderStatus {
    /// Map a platform financial status string onto the local set.
    ///
    /// `partially_refunded` has no local counterpart and is recorded as
    /// `refunded`. Anything unrecognized is `pending`.
    #[must_use]
    pub fn from_platform(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "authorized" => Self::Authorized,
            "paid" => Self::Paid,
            "partially_paid" => Self::PartiallyPaid,
            "refunded" | "partially_refunded" => Self::Refunded,
            "voided" => Self::Voided,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Pending,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Authorized => "authorized",
            Self::Paid => "paid",
            Self::PartiallyPaid => "partially_paid",
            Self::Refunded => "refunded",
            Self::Voided => "voided",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order fulfillment status. "Unset" is represented as `None` on the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    Fulfilled,
    Partial,
    Unfulfilled,
}

impl FulfillmentStatus {
    /// Map a platform fulfillment string, returning `None` when unset or unknown.
    #[must_use]
    pub fn from_platform(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fulfilled" | "shipped" => Some(Self::Fulfilled),
            "partial" | "partially_fulfilled" => Some(Self::Partial),
            "unfulfilled" | "unshipped" => Some(Self::Unfulfilled),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fulfilled => "fulfilled",
            Self::Partial => "partial",
            Self::Unfulfilled => "unfulfilled",
        }
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_from_platform() {
        assert_eq!(OrderStatus::from_platform("paid"), OrderStatus::Paid);
        assert_eq!(
            OrderStatus::from_platform("PARTIALLY_PAID"),
            OrderStatus::PartiallyPaid
        );
        assert_eq!(
            OrderStatus::from_platform("partially_refunded"),
            OrderStatus::Refunded
        );
        assert_eq!(OrderStatus::from_platform("expired"), OrderStatus::Pending);
    }

    #[test]
    fn test_fulfillment_status_from_platform() {
        assert_eq!(
            FulfillmentStatus::from_platform("fulfilled"),
            Some(FulfillmentStatus::Fulfilled)
        );
        assert_eq!(
            FulfillmentStatus::from_platform("partial"),
            Some(FulfillmentStatus::Partial)
        );
        assert_eq!(FulfillmentStatus::from_platform("restocked"), None);
        assert_eq!(FulfillmentStatus::from_platform(""), None);
    }

    #[test]
    fn test_status_serde_names() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::PartiallyPaid).ok().as_deref(),
            Some("\"partially_paid\"")
        );
        assert_eq!(OrderStatus::Cancelled.to_string(), "cancelled");
    }
}
