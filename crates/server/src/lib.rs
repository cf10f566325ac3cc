//! Storesync server library.
//!
//! Mirrors products, customers, and orders from an external commerce
//! platform (Shopify or Lightspeed Retail) into a local store, through
//! signed webhooks and on-demand bulk syncs. Built as a library so the
//! binary, the CLI, and the integration tests share one implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod platform;
pub mod routes;
pub mod services;
pub mod signature;
pub mod state;
pub mod sync;
pub mod translate;
