//! Canonical customer record.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Address;
use crate::types::{Email, ExternalId};

/// A customer mirrored from the platform.
///
/// The email is unique across local customers (case-insensitively, which
/// [`Email`] guarantees by normalizing). POS customers can lack an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub external_id: ExternalId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<Email>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub orders_count: i64,
    pub total_spent: Decimal,
    pub tags: BTreeSet<String>,
    pub accepts_marketing: bool,
    pub platform_created_at: Option<DateTime<Utc>>,
    pub platform_updated_at: Option<DateTime<Utc>>,
}

impl Customer {
    /// First and last name joined, skipping blanks.
    #[must_use]
    pub fn full_name(&self) -> String {
        [self.first_name.trim(), self.last_name.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
