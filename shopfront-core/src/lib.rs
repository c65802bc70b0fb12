//! Shopfront Core - Entity Types
//!
//! Pure data structures shared by the cache layer and the relational provider:
//! typed identifiers, entity families, row and cached shapes, schema rules,
//! errors and cache configuration. This crate performs no I/O.

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod schema;

pub use config::CacheConfig;
pub use entities::*;
pub use enums::{EntityFamily, KeyShape};
pub use error::{CacheError, ConfigError, ShopError, ShopResult, StorageError, ValidationError};
pub use identity::*;
pub use schema::{Schema, Validate};
