//! Chainline Core - Shared domain types.
//!
//! This crate provides the types shared by the Chainline components:
//! - `storefront` - Server-rendered shop for bicycles, parts, and service bookings
//! - `integration-tests` - Live-server tests against a running storefront
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no session
//! handling. The remote API owns persistence; these types describe the
//! contracts the storefront consumes.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, and status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
