//! Error types for shopfront operations

use crate::EntityFamily;
use thiserror::Error;

/// Relational store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Insert failed for {entity}: {reason}")]
    InsertFailed { entity: String, reason: String },

    #[error("Update failed for {entity} with id {id}: {reason}")]
    UpdateFailed {
        entity: String,
        id: String,
        reason: String,
    },

    #[error("Delete failed for {entity} with id {id}: {reason}")]
    DeleteFailed {
        entity: String,
        id: String,
        reason: String,
    },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Key-value store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache connection failed: {reason}")]
    Connection { reason: String },

    #[error("Cache command {command} failed: {reason}")]
    Command { command: String, reason: String },

    #[error("{codec} codec failed: {reason}")]
    Codec { codec: String, reason: String },

    #[error("Key {key} does not belong to family {family}")]
    ForeignKey { key: String, family: EntityFamily },
}

/// Schema validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Constraint violation on {constraint}: {reason}")]
    ConstraintViolation { constraint: String, reason: String },

    #[error("Relation mismatch on {field}: expected {expected}, got {got}")]
    RelationMismatch {
        field: String,
        expected: String,
        got: String,
    },

    #[error("Malformed {schema} value: {reason}")]
    Malformed { schema: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all shopfront errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShopError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ShopError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ShopError::Validation(_))
    }
}

/// Result type alias for shopfront operations.
pub type ShopResult<T> = Result<T, ShopError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            entity: "category".to_string(),
            id: "00000000-0000-0000-0000-000000000000".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Entity not found"));
        assert!(msg.contains("category"));
        assert!(msg.contains("00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn test_cache_error_display_command() {
        let err = CacheError::Command {
            command: "MGET".to_string(),
            reason: "connection reset".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("MGET"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_cache_error_display_foreign_key() {
        let err = CacheError::ForeignKey {
            key: "wishlist::u::p".to_string(),
            family: EntityFamily::Cart,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("wishlist::u::p"));
        assert!(msg.contains("cart"));
    }

    #[test]
    fn test_validation_error_display_relation_mismatch() {
        let err = ValidationError::RelationMismatch {
            field: "product.id".to_string(),
            expected: "a".to_string(),
            got: "b".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("product.id"));
        assert!(msg.contains("expected a"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "cart_ttl".to_string(),
            value: "0s".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("cart_ttl"));
        assert!(msg.contains("0s"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_shop_error_from_variants() {
        let storage = ShopError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, ShopError::Storage(_)));

        let cache = ShopError::from(CacheError::Connection {
            reason: "refused".to_string(),
        });
        assert!(matches!(cache, ShopError::Cache(_)));

        let validation = ShopError::from(ValidationError::RequiredFieldMissing {
            field: "name".to_string(),
        });
        assert!(validation.is_validation());

        let config = ShopError::from(ConfigError::MissingRequired {
            field: "url".to_string(),
        });
        assert!(matches!(config, ShopError::Config(_)));
    }
}
