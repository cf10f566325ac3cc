//! Webhook topics.

use core::fmt;

use storesync_core::EntityKind;

/// What a webhook asks the mirror to do.
///
/// Both platform naming styles parse into the same variants: Shopify's
/// `products/update` and the POS platform's dotted `item.update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// The entity was created or changed.
    Upsert(EntityKind),
    /// The entity was removed on the platform.
    Delete(EntityKind),
    OrderCancelled,
    /// Anything else. Logged and ignored.
    Unrecognized(String),
}

impl Topic {
    /// Parse a raw topic header value.
    ///
    /// ```
    /// use storesync_core::EntityKind;
    /// use storesync_server::sync::Topic;
    ///
    /// assert_eq!(Topic::parse("products/update"), Topic::Upsert(EntityKind::Product));
    /// assert_eq!(Topic::parse("sale.create"), Topic::Upsert(EntityKind::Order));
    /// assert_eq!(Topic::parse("orders/cancelled"), Topic::OrderCancelled);
    /// ```
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let unrecognized = || Self::Unrecognized(raw.to_owned());

        let normalized = raw.trim().to_ascii_lowercase();
        let Some((entity, action)) = normalized.split_once(['/', '.']) else {
            return unrecognized();
        };
        let Some(kind) = entity_kind(entity) else {
            return unrecognized();
        };

        match action {
            "create" | "created" | "update" | "updated" | "edited" | "paid" | "fulfilled"
            | "partially_fulfilled" | "enable" | "disable" | "complete" | "completed" => {
                Self::Upsert(kind)
            }
            "delete" | "deleted" | "destroy" => Self::Delete(kind),
            "cancelled" | "canceled" | "cancel" if kind == EntityKind::Order => {
                Self::OrderCancelled
            }
            _ => unrecognized(),
        }
    }
}

fn entity_kind(entity: &str) -> Option<EntityKind> {
    match entity {
        "item" | "items" => Some(EntityKind::Product),
        "sale" | "sales" => Some(EntityKind::Order),
        other => other.parse().ok(),
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upsert(kind) => write!(f, "{kind}/upsert"),
            Self::Delete(kind) => write!(f, "{kind}/delete"),
            Self::OrderCancelled => f.write_str("orders/cancelled"),
            Self::Unrecognized(raw) => write!(f, "unrecognized({raw})"),
        }
    }
}
