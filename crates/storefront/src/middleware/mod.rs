//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CSP nonce (generate per-request nonce for inline scripts)
//! 5. Security headers (CSP with that nonce, frame and referrer policies)
//! 6. Session layer (tower-sessions with in-memory store)
//! 7. Rate limiting (governor) on cart, wishlist, and checkout mutations

pub mod auth;
pub mod csp;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    OptionalCustomer, RequireAdmin, RequireCustomer, clear_current_customer, set_current_customer,
};
pub use csp::{CspNonce, csp_nonce_middleware};
pub use rate_limit::{checkout_rate_limiter, mutation_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
