//! Service Configuration Module
//!
//! Connection settings for PostgreSQL plus the aggregate configuration the
//! warm-up binary and [`crate::StorefrontServices`] are built from. Values
//! come from environment variables with development defaults.

use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime, Timeouts};
use shopfront_core::{CacheConfig, ConfigError, ShopError, ShopResult};
use shopfront_storage::RedisConfig;
use std::time::Duration;
use tokio_postgres::NoTls;

use crate::error::DbError;
use crate::telemetry::TelemetryConfig;

// ============================================================================
// DATABASE CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection wait timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "shopfront".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    ///
    /// - `SHOPFRONT_DB_HOST` (default: localhost)
    /// - `SHOPFRONT_DB_PORT` (default: 5432)
    /// - `SHOPFRONT_DB_NAME` (default: shopfront)
    /// - `SHOPFRONT_DB_USER` (default: postgres)
    /// - `SHOPFRONT_DB_PASSWORD` (default: empty)
    /// - `SHOPFRONT_DB_POOL_SIZE` (default: 16)
    /// - `SHOPFRONT_DB_TIMEOUT` seconds (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("SHOPFRONT_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("SHOPFRONT_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("SHOPFRONT_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("SHOPFRONT_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("SHOPFRONT_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("SHOPFRONT_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: Duration::from_secs(
                std::env::var("SHOPFRONT_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.timeout.as_secs()),
            ),
        }
    }

    pub fn validate(&self) -> ShopResult<()> {
        if self.host.trim().is_empty() {
            return Err(ShopError::Config(ConfigError::MissingRequired {
                field: "db.host".to_string(),
            }));
        }
        if self.max_size == 0 {
            return Err(ShopError::Config(ConfigError::InvalidValue {
                field: "db.max_size".to_string(),
                value: "0".to_string(),
                reason: "pool needs at least one connection".to_string(),
            }));
        }
        Ok(())
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ShopResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        let mut pool = deadpool_postgres::PoolConfig::new(self.max_size);
        pool.timeouts = Timeouts {
            wait: Some(self.timeout),
            create: Some(self.timeout),
            recycle: Some(self.timeout),
        };
        cfg.pool = Some(pool);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(DbError::from)?;
        Ok(pool)
    }
}

// ============================================================================
// AGGREGATE CONFIGURATION
// ============================================================================

/// Everything needed to bring up the storefront caches.
#[derive(Debug, Clone, Default)]
pub struct ShopfrontConfig {
    pub db: DbConfig,
    pub redis: RedisConfig,
    pub cache: CacheConfig,
    pub telemetry: TelemetryConfig,
}

impl ShopfrontConfig {
    pub fn from_env() -> Self {
        Self {
            db: DbConfig::from_env(),
            redis: RedisConfig::from_env(),
            cache: CacheConfig::from_env(),
            telemetry: TelemetryConfig::from_env(),
        }
    }

    pub fn validate(&self) -> ShopResult<()> {
        self.db.validate()?;
        self.redis.validate()?;
        self.cache.validate()
    }
}
