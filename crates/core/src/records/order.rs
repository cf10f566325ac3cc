//! Canonical order record.
//!
//! The platform's `total` is authoritative. It is stored as reported and never
//! recomputed from line items, taxes, shipping, and discounts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Address;
use crate::types::{ExternalId, FulfillmentStatus, OrderStatus, non_negative};

/// An order mirrored from the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub external_id: ExternalId,
    /// Sequential, human-facing order number (unique).
    pub order_number: String,
    /// `None` for guest checkouts and anonymous POS sales.
    pub customer_external_id: Option<ExternalId>,
    pub line_items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub fulfillment_status: Option<FulfillmentStatus>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
    pub cancellation: Option<Cancellation>,
    pub placed_at: Option<DateTime<Utc>>,
    pub platform_updated_at: Option<DateTime<Utc>>,
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_external_id: Option<ExternalId>,
    pub variant_external_id: Option<ExternalId>,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub sku: Option<String>,
}

impl LineItem {
    /// Build a line item, enforcing `quantity >= 1` and `unit_price >= 0`.
    ///
    /// When the platform does not report a line total, it is computed from the
    /// clamped quantity and unit price. Returns `None` if that product does
    /// not fit in a `Decimal`.
    #[must_use]
    pub fn new(
        name: String,
        quantity: i64,
        unit_price: Decimal,
        line_total: Option<Decimal>,
    ) -> Option<Self> {
        let quantity = quantity.max(1);
        let unit_price = non_negative(unit_price);
        let line_total = match line_total {
            Some(total) => non_negative(total),
            None => unit_price.checked_mul(Decimal::from(quantity))?,
        };

        Some(Self {
            product_external_id: None,
            variant_external_id: None,
            name,
            quantity,
            unit_price,
            line_total,
            sku: None,
        })
    }
}

/// Cancellation metadata stamped on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub cancelled_at: DateTime<Utc>,
    pub reason: Option<String>,
}
