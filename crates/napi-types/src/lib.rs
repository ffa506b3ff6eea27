//! Strongly typed identifiers used throughout the NAPI crates.
//!
//! Every entity that is keyed by a UUID gets its own newtype here instead of
//! passing bare `uuid::Uuid` around, so that a `NetworkId` can never be
//! accidentally handed to a function expecting a `NetworkPoolId`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
#[cfg(feature = "sqlx")]
use sqlx::{
    Type,
    postgres::{PgHasArrayType, PgTypeInfo},
};

#[derive(thiserror::Error, Debug)]
pub enum UuidConversionError {
    #[error("invalid {ty}: {value}")]
    InvalidUuid { ty: &'static str, value: String },
}

/// Generates the standard set of conversions for a UUID newtype: `Display`,
/// `FromStr`, `From<Uuid>`/`Into<Uuid>`, and (with the `sqlx` feature) a
/// Postgres `UUID` column binding.
macro_rules! napi_uuid_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Ord, PartialOrd,
        )]
        #[cfg_attr(feature = "sqlx", derive(Type))]
        #[cfg_attr(feature = "sqlx", sqlx(transparent))]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl FromStr for $name {
            type Err = UuidConversionError;
            fn from_str(input: &str) -> Result<Self, UuidConversionError> {
                Ok(Self(uuid::Uuid::parse_str(input).map_err(|_| {
                    UuidConversionError::InvalidUuid {
                        ty: stringify!($name),
                        value: input.to_string(),
                    }
                })?))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        #[cfg(feature = "sqlx")]
        impl PgHasArrayType for $name {
            fn array_type_info() -> PgTypeInfo {
                <uuid::Uuid as PgHasArrayType>::array_type_info()
            }

            fn array_compatible(ty: &PgTypeInfo) -> bool {
                <uuid::Uuid as PgHasArrayType>::array_compatible(ty)
            }
        }
    };
}

napi_uuid_id!(NetworkId);
napi_uuid_id!(NetworkPoolId);
napi_uuid_id!(OwnerId);
napi_uuid_id!(NicTagId);
/// Identifies the zone, server, or other entity a nic or aggregation
/// belongs to. Deliberately not `OwnerId`: ownership and attachment are
/// separate relationships that happen to both be caller-supplied UUIDs.
napi_uuid_id!(BelongsToId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_string() {
        let id = NetworkId::new();
        let parsed: NetworkId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_garbage() {
        assert!(NetworkId::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn distinct_newtypes_do_not_compare() {
        let net_id = NetworkId::new();
        let pool_id = NetworkPoolId(net_id.0);
        // Same underlying UUID, but the types are distinct at compile time;
        // this just checks the inner value round-trips through the newtype.
        assert_eq!(net_id.0, pool_id.0);
    }
}
