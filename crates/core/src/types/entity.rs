//! The kinds of entity that are mirrored from the external platform.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A mirrored entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Customer,
    Order,
}

impl EntityKind {
    /// Every kind, in the order a full sync processes them.
    ///
    /// Products and customers go first so orders synced afterwards can refer
    /// to records that already exist locally.
    pub const ALL: [Self; 3] = [Self::Product, Self::Customer, Self::Order];

    /// Plural path segment used in routes and platform topics (`products`).
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            Self::Product => "products",
            Self::Customer => "customers",
            Self::Order => "orders",
        }
    }

    /// Singular name (`product`).
    #[must_use]
    pub const fn singular(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Customer => "customer",
            Self::Order => "order",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}

/// Error returned when a string does not name an [`EntityKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entity kind: {0}")]
pub struct UnknownEntityKind(pub String);

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    /// Accepts singular or plural names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "product" | "products" => Ok(Self::Product),
            "customer" | "customers" => Ok(Self::Customer),
            "order" | "orders" => Ok(Self::Order),
            _ => Err(UnknownEntityKind(s.to_owned())),
        }
    }
}
