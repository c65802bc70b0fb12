//! Database error conversion.
//!
//! Backend errors are logged in full here and reduced to
//! [`StorageError`] before they leave the crate.

use deadpool_postgres::{CreatePoolError, PoolError};
use shopfront_core::{ShopError, StorageError, ValidationError};
use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Failure inside the Postgres provider.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("failed to create pool: {0}")]
    CreatePool(#[from] CreatePoolError),

    #[error("invalid stored value in {column}: {reason}")]
    Decode { column: &'static str, reason: String },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

pub type DbResult<T> = Result<T, DbError>;

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Decode {
            column: "options",
            reason: err.to_string(),
        }
    }
}

impl From<DbError> for ShopError {
    fn from(err: DbError) -> Self {
        let storage = match err {
            DbError::Invalid(err) => return ShopError::Validation(err),
            DbError::Postgres(err) => {
                tracing::error!("Database error: {:?}", err);
                let table = err
                    .as_db_error()
                    .and_then(|db| db.table())
                    .unwrap_or("row")
                    .to_string();
                match err.code() {
                    Some(code) if *code == SqlState::UNIQUE_VIOLATION => {
                        StorageError::InsertFailed {
                            entity: table,
                            reason: "already exists".to_string(),
                        }
                    }
                    Some(code) if *code == SqlState::FOREIGN_KEY_VIOLATION => {
                        StorageError::QueryFailed {
                            reason: format!(
                                "{} references a missing or still referenced row",
                                table
                            ),
                        }
                    }
                    _ => StorageError::QueryFailed {
                        reason: "database operation failed".to_string(),
                    },
                }
            }
            DbError::Pool(err) => {
                tracing::error!("Connection pool error: {:?}", err);
                match err {
                    PoolError::Timeout(_) => StorageError::ConnectionFailed {
                        reason: "connection pool exhausted".to_string(),
                    },
                    PoolError::Closed => StorageError::ConnectionFailed {
                        reason: "connection pool is closed".to_string(),
                    },
                    _ => StorageError::ConnectionFailed {
                        reason: "failed to acquire database connection".to_string(),
                    },
                }
            }
            DbError::CreatePool(err) => {
                tracing::error!("Failed to create pool: {:?}", err);
                StorageError::ConnectionFailed {
                    reason: err.to_string(),
                }
            }
            DbError::Decode { column, reason } => {
                tracing::error!(column, %reason, "Undecodable stored value");
                StorageError::QueryFailed {
                    reason: format!("invalid stored {}", column),
                }
            }
        };
        ShopError::Storage(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_pool_is_connection_failure() {
        let err: ShopError = DbError::Pool(PoolError::Closed).into();
        assert!(matches!(
            err,
            ShopError::Storage(StorageError::ConnectionFailed { .. })
        ));
    }

    #[test]
    fn test_rejected_write_stays_a_validation_error() {
        let err: ShopError = DbError::from(ValidationError::InvalidValue {
            field: "country".to_string(),
            reason: "expected ISO 3166-1 alpha-2".to_string(),
        })
        .into();
        assert!(err.is_validation());
    }

    #[test]
    fn test_decode_error_names_column() {
        let err: ShopError = DbError::Decode {
            column: "options",
            reason: "expected map".to_string(),
        }
        .into();
        assert_eq!(
            err,
            ShopError::Storage(StorageError::QueryFailed {
                reason: "invalid stored options".to_string()
            })
        );
    }
}
