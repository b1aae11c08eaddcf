//! Integration tests for the Chainline storefront.
//!
//! # Running Tests
//!
//! ```bash
//! # Library-level suites (no network)
//! cargo test -p chainline-integration-tests
//!
//! # Live suites against a running storefront
//! STOREFRONT_BASE_URL=http://localhost:3000 \
//!     cargo test -p chainline-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `payment_flow` - confirmation and polling through the public payment API
//! - `local_store` - per-customer snapshots across sign-out
//! - `storefront_live` - HTTP smoke tests against a running server

#![cfg_attr(not(test), forbid(unsafe_code))]

/// Base URL of the storefront under test.
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}
