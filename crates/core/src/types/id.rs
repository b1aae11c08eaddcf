//! Newtype IDs for type-safe entity references.
//!
//! The remote API identifies every resource by an integer primary key. The
//! `define_id!` macro wraps those keys so a `BicycleId` can never be passed
//! where a `PartId` is expected.

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i32` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `Ord`
/// - Conversion methods: `new()`, `as_i32()`
/// - `Display`, `FromStr`, `From<i32>` and `Into<i32>` implementations
///
/// # Example
///
/// ```rust
/// # use chainline_core::define_id;
/// define_id!(FrameId);
/// define_id!(WheelId);
///
/// let frame = FrameId::new(1);
/// let wheel = WheelId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: FrameId = wheel;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<i32>().map(Self)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(CustomerId);
define_id!(BicycleId);
define_id!(PartId);
define_id!(ServiceId);
define_id!(CartItemId);
define_id!(WishlistItemId);
define_id!(BookingId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_and_parse() {
        let id = BicycleId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!("42".parse::<BicycleId>().unwrap(), id);
        assert_eq!(" 7 ".parse::<PartId>().unwrap(), PartId::new(7));
        assert!("seven".parse::<PartId>().is_err());
    }

    #[test]
    fn test_id_serde_is_transparent() {
        let json = serde_json::to_string(&CartItemId::new(5)).unwrap();
        assert_eq!(json, "5");
        let parsed: CartItemId = serde_json::from_str("5").unwrap();
        assert_eq!(parsed.as_i32(), 5);
    }
}
