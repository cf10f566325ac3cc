//! Canonical product record.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::ExternalId;

/// Brand used when the platform reports none.
pub const UNKNOWN_BRAND: &str = "Unknown";

/// Category used when the platform reports none.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Image used when the platform reports none.
pub const PLACEHOLDER_IMAGE_URL: &str = "https://placehold.co/600x600?text=No+Image";

/// A product mirrored from the platform.
///
/// Stock availability is not stored; [`Product::in_stock`] is derived from
/// `stock_quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub external_id: ExternalId,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub description: String,
    /// Primary image URL; the placeholder when the product has no images.
    pub image_url: String,
    pub images: Vec<String>,
    pub stock_quantity: i64,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub tags: BTreeSet<String>,
    pub variants: Vec<ProductVariant>,
    pub is_new: bool,
    pub is_featured: bool,
    pub popularity: i32,
    /// When the platform created the product.
    pub added_at: Option<DateTime<Utc>>,
    /// When the platform last changed the product.
    pub platform_updated_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Whether any stock is on hand.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }
}

/// A purchasable variant of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub external_id: Option<ExternalId>,
    pub title: String,
    pub price: Decimal,
    pub sku: Option<String>,
    pub quantity: i64,
}
