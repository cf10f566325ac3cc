//! Storesync Core - canonical record types.
//!
//! This crate provides the types shared by every Storesync component:
//! - `server` - Webhook ingestion, bulk sync jobs, platform clients
//! - `cli` - Migrations, one-off syncs, webhook signing
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no database
//! access, no HTTP clients. Everything the external platform sends ends up in
//! one of the [`records`] after translation.
//!
//! # Modules
//!
//! - [`types`] - External IDs, emails, money parsing, statuses, entity kinds
//! - [`records`] - Canonical product, customer, and order records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod records;
pub mod types;

pub use records::*;
pub use types::*;
