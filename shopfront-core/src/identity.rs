//! Identity types for shopfront entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn new_entity_id() -> Uuid {
    Uuid::now_v7()
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh timestamp-sortable identifier.
            pub fn generate() -> Self {
                Self(new_entity_id())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

uuid_id!(CategoryId);
uuid_id!(SubcategoryId);
uuid_id!(ProductTypeId);
uuid_id!(ProductId);
uuid_id!(VariantId);
uuid_id!(AddressId);

string_id!(
    /// Subject identifier issued by the external auth provider.
    UserId
);
string_id!(
    /// Identifier of an uploaded media object. Other entities hold it as a
    /// weak reference and resolve it at read time.
    MediaId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_time_ordered() {
        let a = ProductId::generate();
        let b = ProductId::generate();
        assert!(a <= b);
    }

    #[test]
    fn test_uuid_id_parse_display() {
        let id = CategoryId::generate();
        let parsed: CategoryId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<CategoryId>().is_err());
    }

    #[test]
    fn test_string_id_serializes_transparently() {
        let id = UserId::new("user_2abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"user_2abc\"");
        let back: UserId = serde_json::from_str("\"user_2abc\"").unwrap();
        assert_eq!(back, id);
    }
}
