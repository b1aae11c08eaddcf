//! Chainline Storefront library.
//!
//! Server-rendered shop for bicycles, parts, and workshop bookings. The
//! binary in `main.rs` wires these modules into an Axum server; keeping them
//! in a library lets the sync and payment layers be tested in isolation.
//!
//! # Modules
//!
//! - [`api`] - Remote API client (cart, wishlist, catalog, bookings, checkout)
//! - [`store`] - Per-customer local snapshots of cart and wishlist
//! - [`sync`] - Optimistic cart/wishlist mutations with reconciliation
//! - [`payment`] - Payment confirmation flow, polling, and navigation guard
//! - [`routes`] - HTTP handlers and templates

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod payment;
pub mod routes;
pub mod state;
pub mod store;
pub mod sync;
