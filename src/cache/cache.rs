//! Generic JSON cache over a bb8 Redis pool.
//!
//! Reads degrade gracefully: a pool or deserialization failure is reported
//! as a miss so callers fall back to the database.

use super::{error::CacheResult, RedisPool};
use async_trait::async_trait;
use bb8::PooledConnection;
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

type RedisConnection<'a> = PooledConnection<'a, RedisConnectionManager>;

#[async_trait]
pub trait Cache<T: Serialize + DeserializeOwned + Send + Sync + 'static> {
    async fn get(&self, key: &str) -> CacheResult<Option<T>>;

    /// Store a value; `ttl: None` keeps it until deleted
    async fn set(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Delete every key matching a glob, returning how many were removed
    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64>;
}

#[derive(Clone)]
pub struct RedisCache {
    pool: RedisPool,
}

impl RedisCache {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Option<RedisConnection<'_>> {
        match self.pool.get().await {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!("Failed to get Redis connection: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl<T: Serialize + DeserializeOwned + Send + Sync + 'static> Cache<T> for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<T>> {
        let Some(mut conn) = self.connection().await else {
            return Ok(None);
        };

        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(json) => match serde_json::from_str(&json) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!("Discarding undecodable cache entry '{}': {}", key, e);
                    Ok(None)
                }
            },
            None => {
                debug!("Cache miss for key: {}", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &T, ttl: Option<Duration>) -> CacheResult<()> {
        let Some(mut conn) = self.connection().await else {
            return Ok(());
        };

        let json = serde_json::to_string(value)?;
        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(key, json, ttl.as_secs().max(1)).await?;
            }
            None => {
                let _: () = conn.set(key, json).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let Some(mut conn) = self.connection().await else {
            return Ok(false);
        };

        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let Some(mut conn) = self.connection().await else {
            return Ok(0);
        };

        let keys: Vec<String> = conn.keys(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let removed: i64 = conn.del(&keys).await?;
        debug!("Cache delete_pattern '{}' removed {} keys", pattern, removed);
        Ok(removed.max(0) as u64)
    }
}

pub mod ttl {
    use std::time::Duration;

    /// Public donation and prayer listings
    pub const DONATION_LISTINGS: Duration = Duration::from_secs(60);
}
