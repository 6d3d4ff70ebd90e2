//! Type-safe identifier wrappers around sequential `u64` values.
//!
//! People and partnerships are allocated identifiers by the population
//! store in creation order, so iteration over id-keyed maps is
//! deterministic for a given seed.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `u64` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            /// Wrap a raw identifier value.
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Return the inner value.
            pub const fn into_inner(self) -> u64 {
                self.0
            }

            /// The identifier allocated after this one, or `None` on overflow.
            pub const fn next(self) -> Option<Self> {
                match self.0.checked_add(1) {
                    Some(value) => Some(Self(value)),
                    None => None,
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a simulated person.
    PersonId
}

define_id! {
    /// Unique identifier for a partnership between two people.
    PartnershipId
}
