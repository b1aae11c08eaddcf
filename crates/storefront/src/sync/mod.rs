//! Cart and wishlist synchronization.
//!
//! Keeps each customer's [`LocalStore`](crate::store::LocalStore) aligned
//! with the remote API, which is the source of truth:
//!
//! 1. A mutation is applied to the local snapshot first (optimistic update)
//!    and counted as pending
//! 2. The remote mutation is issued
//! 3. On success the authoritative payload replaces the local value
//! 4. On failure the snapshot is flagged stale, and depending on the
//!    operation either refetched right away or on the next read
//!
//! Failures reach callers as a [`SyncError`] carrying one display message.
//!
//! Responses are not sequenced: when two mutations overlap, whichever settles
//! last determines the local value.

mod cart;
#[cfg(test)]
mod fake;
mod wishlist;

pub use cart::CartSync;
pub use wishlist::WishlistSync;

use thiserror::Error;

use crate::api::ApiError;

/// A cart or wishlist operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The API could not be reached or answered with a server error.
    #[error("{0}")]
    Network(String),

    /// The request was rejected (unknown product, stock exceeded, ...).
    #[error("{0}")]
    Validation(String),

    /// The customer's token is missing or no longer valid.
    #[error("{0}")]
    AuthRequired(String),
}

impl SyncError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// The message to show the customer.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Network(m) | Self::Validation(m) | Self::AuthRequired(m) => m,
        }
    }
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Validation(message) | ApiError::NotFound(message) => {
                Self::Validation(message)
            }
            ApiError::Unauthorized => {
                Self::AuthRequired("Please sign in again to continue.".to_string())
            }
            ApiError::Http(_) | ApiError::Url(_) => Self::Network(
                "We couldn't reach the shop. Check your connection and try again.".to_string(),
            ),
            ApiError::Api { .. } | ApiError::Parse(_) => Self::Network(
                "The shop is having trouble right now. Please try again shortly.".to_string(),
            ),
        }
    }
}

/// What to do with the local snapshot after a remote mutation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnFailure {
    /// Leave the optimistic value in place, flagged stale; the next read refetches.
    MarkStale,
    /// Refetch immediately to discard the optimistic value.
    Refetch,
}
