//! Redis-backed key-value store.
//!
//! Connections come from a `deadpool-redis` pool that is created by
//! [`RedisStore::connect`] and shut down by [`RedisStore::close`]; nothing is
//! held in a global. Pattern enumeration uses a `SCAN ... MATCH ... COUNT`
//! cursor loop rather than `KEYS`, and multi-key writes go out as a single
//! pipeline.

use async_trait::async_trait;
use deadpool_redis::{Config, CreatePoolError, Pool, PoolConfig, PoolError, Runtime, Timeouts};
use redis::{AsyncCommands, RedisError};
use shopfront_core::{CacheError, ConfigError, ShopError, ShopResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::key::CacheKey;
use super::traits::{CacheStats, KeyValueStore};

/// Error type for Redis cache operations.
#[derive(Debug, thiserror::Error)]
pub enum RedisCacheError {
    /// Failed to build the connection pool.
    #[error("Failed to create Redis pool: {0}")]
    PoolCreate(#[from] CreatePoolError),

    /// Failed to check a connection out of the pool.
    #[error("Failed to get Redis connection: {0}")]
    Pool(#[from] PoolError),

    /// A command was rejected or the connection dropped mid-command.
    #[error("Redis {command} failed: {source}")]
    Command {
        command: &'static str,
        source: RedisError,
    },
}

impl From<RedisCacheError> for ShopError {
    fn from(e: RedisCacheError) -> Self {
        let err = match e {
            RedisCacheError::PoolCreate(_) | RedisCacheError::Pool(_) => CacheError::Connection {
                reason: e.to_string(),
            },
            RedisCacheError::Command { command, source } => CacheError::Command {
                command: command.to_string(),
                reason: source.to_string(),
            },
        };
        ShopError::Cache(err)
    }
}

fn command(command: &'static str) -> impl FnOnce(RedisError) -> RedisCacheError {
    move |source| RedisCacheError::Command { command, source }
}

/// Redis connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// Connection URL (`redis://`, `rediss://` or `unix://`).
    pub url: String,
    /// Maximum pooled connections.
    pub pool_size: usize,
    /// Wait, create and recycle timeout in milliseconds.
    pub timeout_ms: u64,
    /// `COUNT` hint for each `SCAN` step.
    pub scan_count: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            timeout_ms: 5000,
            scan_count: 100,
        }
    }
}

impl RedisConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `SHOPFRONT_REDIS_URL` (default: redis://localhost:6379)
    /// - `SHOPFRONT_REDIS_POOL_SIZE` (default: 10)
    /// - `SHOPFRONT_REDIS_TIMEOUT_MS` (default: 5000)
    /// - `SHOPFRONT_REDIS_SCAN_COUNT` (default: 100)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            url: std::env::var("SHOPFRONT_REDIS_URL").unwrap_or(defaults.url),
            pool_size: std::env::var("SHOPFRONT_REDIS_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pool_size),
            timeout_ms: std::env::var("SHOPFRONT_REDIS_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_ms),
            scan_count: std::env::var("SHOPFRONT_REDIS_SCAN_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.scan_count),
        }
    }

    pub fn validate(&self) -> ShopResult<()> {
        let scheme_ok = ["redis://", "rediss://", "unix://"]
            .iter()
            .any(|scheme| self.url.starts_with(scheme));
        if !scheme_ok {
            return Err(ShopError::Config(ConfigError::InvalidValue {
                field: "redis.url".to_string(),
                value: self.redacted_url(),
                reason: "must start with redis://, rediss:// or unix://".to_string(),
            }));
        }
        if self.pool_size == 0 {
            return Err(ShopError::Config(ConfigError::InvalidValue {
                field: "redis.pool_size".to_string(),
                value: self.pool_size.to_string(),
                reason: "pool_size must be greater than 0".to_string(),
            }));
        }
        if self.scan_count == 0 {
            return Err(ShopError::Config(ConfigError::InvalidValue {
                field: "redis.scan_count".to_string(),
                value: self.scan_count.to_string(),
                reason: "scan_count must be greater than 0".to_string(),
            }));
        }
        Ok(())
    }

    /// URL with any password replaced, for logging.
    pub fn redacted_url(&self) -> String {
        match (self.url.find("://"), self.url.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}://***{}", &self.url[..scheme_end], &self.url[at..])
            }
            _ => self.url.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    enumerations: AtomicU64,
}

/// Key-value store over a Redis connection pool.
pub struct RedisStore {
    pool: Pool,
    scan_count: usize,
    counters: Counters,
}

impl RedisStore {
    /// Build the pool and verify the server answers `PING`.
    pub async fn connect(config: &RedisConfig) -> ShopResult<Self> {
        config.validate()?;
        info!(url = %config.redacted_url(), "Connecting to Redis");

        let timeout = Some(Duration::from_millis(config.timeout_ms));
        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts = Timeouts {
            wait: timeout,
            create: timeout,
            recycle: timeout,
        };

        let mut redis_config = Config::from_url(&config.url);
        redis_config.pool = Some(pool_config);
        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(RedisCacheError::from)?;

        let store = Self::from_pool(pool, config.scan_count);
        store.ping().await?;
        info!(pool_size = config.pool_size, "Connected to Redis");
        Ok(store)
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: Pool, scan_count: usize) -> Self {
        Self {
            pool,
            scan_count: scan_count.max(1),
            counters: Counters::default(),
        }
    }

    pub async fn ping(&self) -> ShopResult<()> {
        let mut conn = self.conn().await?;
        let _pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(command("PING"))?;
        Ok(())
    }

    /// Close the pool. Checked-out connections finish their command; later
    /// calls fail with a connection error.
    pub fn close(&self) {
        self.pool.close();
        info!("Redis pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, RedisCacheError> {
        Ok(self.pool.get().await?)
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &CacheKey) -> ShopResult<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        let value: Option<Vec<u8>> = conn.get(key.as_str()).await.map_err(command("GET"))?;
        let counter = if value.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    async fn mget(&self, keys: &[CacheKey]) -> ShopResult<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("MGET");
        for key in keys {
            cmd.arg(key.as_str());
        }
        let values: Vec<Option<Vec<u8>>> =
            cmd.query_async(&mut conn).await.map_err(command("MGET"))?;

        let hits = values.iter().filter(|v| v.is_some()).count() as u64;
        self.counters.hits.fetch_add(hits, Ordering::Relaxed);
        self.counters
            .misses
            .fetch_add(values.len() as u64 - hits, Ordering::Relaxed);
        Ok(values)
    }

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Option<Duration>) -> ShopResult<()> {
        let mut conn = self.conn().await?;
        match ttl {
            Some(ttl) => {
                let _: () = conn
                    .set_ex(key.as_str(), value, ttl_secs(ttl))
                    .await
                    .map_err(command("SET"))?;
            }
            None => {
                let _: () = conn
                    .set(key.as_str(), value)
                    .await
                    .map_err(command("SET"))?;
            }
        }
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn set_many(
        &self,
        entries: Vec<(CacheKey, Vec<u8>)>,
        ttl: Option<Duration>,
    ) -> ShopResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        for (key, value) in &entries {
            match ttl {
                Some(ttl) => pipe
                    .set_ex(key.as_str(), value.as_slice(), ttl_secs(ttl))
                    .ignore(),
                None => pipe.set(key.as_str(), value.as_slice()).ignore(),
            };
        }

        let mut conn = self.conn().await?;
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(command("PIPELINE"))?;
        self.counters
            .writes
            .fetch_add(entries.len() as u64, Ordering::Relaxed);
        debug!(entries = entries.len(), "Pipelined cache write");
        Ok(())
    }

    async fn del(&self, keys: &[CacheKey]) -> ShopResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        let names: Vec<&str> = keys.iter().map(CacheKey::as_str).collect();
        let deleted: u64 = conn.del(names).await.map_err(command("DEL"))?;
        self.counters.deletes.fetch_add(deleted, Ordering::Relaxed);
        Ok(deleted)
    }

    async fn keys(&self, pattern: &CacheKey) -> ShopResult<Vec<CacheKey>> {
        let mut conn = self.conn().await?;
        let mut cursor: u64 = 0;
        let mut found = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern.as_str())
                .arg("COUNT")
                .arg(self.scan_count)
                .query_async(&mut conn)
                .await
                .map_err(command("SCAN"))?;
            found.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        self.counters.enumerations.fetch_add(1, Ordering::Relaxed);

        // SCAN may return a key more than once across iterations.
        found.sort();
        found.dedup();
        Ok(found.into_iter().map(CacheKey::from_raw_unchecked).collect())
    }

    async fn stats(&self) -> ShopResult<CacheStats> {
        Ok(CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
            enumerations: self.counters.enumerations.load(Ordering::Relaxed),
            entry_count: None,
        })
    }
}
