//! Redis-backed read cache for public campaign listings

pub mod cache;
pub mod error;
pub mod keys;

pub use cache::{Cache, RedisCache};
pub use error::CacheError;

use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use std::time::Duration;
use tracing::{error, info, warn};

pub type RedisPool = Pool<RedisConnectionManager>;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub redis_url: String,
    pub max_connections: u32,
    pub min_idle: u32,
    pub connection_timeout: Duration,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 10,
            min_idle: 1,
            connection_timeout: Duration::from_secs(2),
            max_lifetime: Duration::from_secs(300),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    pub fn with_url(redis_url: impl Into<String>) -> Self {
        Self {
            redis_url: redis_url.into(),
            ..Self::default()
        }
    }
}

/// Build the Redis pool. A failed initial PING is logged, not fatal: reads
/// fall through to Postgres until Redis comes back.
pub async fn init_cache_pool(config: CacheConfig) -> Result<RedisPool, CacheError> {
    info!(
        max_connections = config.max_connections,
        "Initializing Redis cache pool"
    );

    let manager = RedisConnectionManager::new(config.redis_url.clone()).map_err(|e| {
        error!("Failed to create Redis connection manager: {}", e);
        CacheError::ConnectionError(e.to_string())
    })?;

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .min_idle(config.min_idle)
        .connection_timeout(config.connection_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .build(manager)
        .await
        .map_err(|e| {
            error!("Failed to build Redis connection pool: {}", e);
            CacheError::ConnectionError(e.to_string())
        })?;

    if let Err(e) = health_check(&pool).await {
        warn!("Initial Redis ping failed, continuing without warm cache: {}", e);
    }

    Ok(pool)
}

pub async fn health_check(pool: &RedisPool) -> Result<(), CacheError> {
    let mut conn = pool.get().await?;
    let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
    Ok(())
}
