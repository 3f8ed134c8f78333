//! Identifier types used throughout the engine.
//!
//! All identifiers are assigned by the storage layer. The engine never
//! invents them; it only carries them between records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! storage_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw storage identifier.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw storage identifier.
            #[must_use]
            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.trim().parse()?))
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

storage_id!(
    /// Identifier of an application (the product being licensed).
    ApplicationId
);

storage_id!(
    /// Identifier of a signing key pair.
    KeyPairId
);

storage_id!(
    /// Identifier of an issued license. Optionally embedded in the signed file.
    LicenseId
);

storage_id!(
    /// Identifier of a custom field definition.
    FieldDefinitionId
);
