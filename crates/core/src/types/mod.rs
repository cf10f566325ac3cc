//! Core types for Storesync.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod entity;
pub mod id;
pub mod money;
pub mod status;

pub use email::{Email, EmailError};
pub use entity::{EntityKind, UnknownEntityKind};
pub use id::ExternalId;
pub use money::{MoneyError, non_negative, parse_count, parse_money};
pub use status::*;
