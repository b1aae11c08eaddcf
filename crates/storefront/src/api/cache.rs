//! Cache types for catalog reads.
//!
//! Only catalog data is cached. Cart, wishlist, and bookings belong to one
//! customer and always go to the network.

use chainline_core::{BicycleId, PartId};

use crate::api::types::{Bicycle, Part, Service};

/// Cache key: the identity of the resource being read.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Bicycle(BicycleId),
    Bicycles,
    Part(PartId),
    Parts,
    Services,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Bicycle(Box<Bicycle>),
    Bicycles(Vec<Bicycle>),
    Part(Box<Part>),
    Parts(Vec<Part>),
    Services(Vec<Service>),
}
