//! Enum types for shopfront entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Shape of the identity tuple a family keys its entries by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyShape {
    /// `prefix::id`
    Simple,
    /// `prefix::comp1::comp2::...` with a fixed number of components.
    Composite { arity: usize },
}

impl KeyShape {
    pub fn arity(&self) -> usize {
        match self {
            KeyShape::Simple => 1,
            KeyShape::Composite { arity } => *arity,
        }
    }
}

/// Cached entity family. Each family owns a disjoint key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityFamily {
    Category,
    Subcategory,
    ProductType,
    MediaItem,
    User,
    Cart,
    Wishlist,
}

impl EntityFamily {
    pub const ALL: [EntityFamily; 7] = [
        EntityFamily::Category,
        EntityFamily::Subcategory,
        EntityFamily::ProductType,
        EntityFamily::MediaItem,
        EntityFamily::User,
        EntityFamily::Cart,
        EntityFamily::Wishlist,
    ];

    /// Key prefix. No prefix is a prefix of another followed by the separator.
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityFamily::Category => "category",
            EntityFamily::Subcategory => "subcategory",
            EntityFamily::ProductType => "product-type",
            EntityFamily::MediaItem => "media",
            EntityFamily::User => "user",
            EntityFamily::Cart => "cart",
            EntityFamily::Wishlist => "wishlist",
        }
    }

    pub fn key_shape(&self) -> KeyShape {
        match self {
            // user + product + variant
            EntityFamily::Cart => KeyShape::Composite { arity: 3 },
            // user + product
            EntityFamily::Wishlist => KeyShape::Composite { arity: 2 },
            _ => KeyShape::Simple,
        }
    }

    /// Expiration applied when no override is configured.
    pub fn default_ttl(&self) -> Duration {
        match self {
            EntityFamily::Cart | EntityFamily::Wishlist => WEEK,
            _ => DAY,
        }
    }
}

impl fmt::Display for EntityFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for EntityFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityFamily::ALL
            .into_iter()
            .find(|family| family.prefix() == s)
            .ok_or_else(|| format!("unknown entity family: {}", s))
    }
}
