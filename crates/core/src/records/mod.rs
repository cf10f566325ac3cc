//! Canonical records mirrored from the external platform.
//!
//! A record is always written to the local store as a whole. Every sync of an
//! external ID replaces every mutable field of the stored record with the
//! record's values; no field survives from an earlier version. Translators
//! therefore build complete records, with defaults for anything the platform
//! left out.

pub mod address;
pub mod customer;
pub mod order;
pub mod product;

use serde::{Deserialize, Serialize};

pub use address::Address;
pub use customer::Customer;
pub use order::{Cancellation, LineItem, Order};
pub use product::{PLACEHOLDER_IMAGE_URL, Product, ProductVariant, UNCATEGORIZED, UNKNOWN_BRAND};

use crate::types::{EntityKind, ExternalId};

/// Any canonical record, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum Record {
    Product(Product),
    Customer(Customer),
    Order(Order),
}

impl Record {
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Product(_) => EntityKind::Product,
            Self::Customer(_) => EntityKind::Customer,
            Self::Order(_) => EntityKind::Order,
        }
    }

    /// The external ID the record is keyed by.
    #[must_use]
    pub const fn external_id(&self) -> &ExternalId {
        match self {
            Self::Product(p) => &p.external_id,
            Self::Customer(c) => &c.external_id,
            Self::Order(o) => &o.external_id,
        }
    }
}

impl From<Product> for Record {
    fn from(product: Product) -> Self {
        Self::Product(product)
    }
}

impl From<Customer> for Record {
    fn from(customer: Customer) -> Self {
        Self::Customer(customer)
    }
}

impl From<Order> for Record {
    fn from(order: Order) -> Self {
        Self::Order(order)
    }
}
