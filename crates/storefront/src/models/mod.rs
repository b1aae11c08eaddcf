//! Session-held models for the storefront.
//!
//! The remote API owns all persistent data; the storefront only keeps what a
//! request needs to act for the signed-in customer.

pub mod session;

pub use session::{CheckoutSession, CurrentCustomer, session_keys};
