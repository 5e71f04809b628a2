//! Redis caching layer for Kulipa Billing
//!
//! Implements the `CacheService` trait from kulipa-core over a Redis
//! `ConnectionManager`. The billing services use it as a read-through
//! cache for plan definitions; a cache failure is never fatal to them.
//!
//! # Example
//!
//! ```no_run
//! use kulipa_cache::{keys, RedisCache};
//! use kulipa_core::traits::CacheService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = RedisCache::new("redis://127.0.0.1:6379").await?;
//!
//!     cache.set(&keys::plan_key(1), &"basic", 300).await?;
//!     let value: Option<String> = cache.get(&keys::plan_key(1)).await?;
//!     assert_eq!(value, Some("basic".to_string()));
//!
//!     Ok(())
//! }
//! ```

pub mod keys;

use async_trait::async_trait;
use kulipa_core::error::AppError;
use kulipa_core::traits::CacheService;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

/// Redis cache implementation with connection pooling
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis
    ///
    /// # Errors
    ///
    /// Returns `AppError::CacheConnection` if the URL is invalid or the
    /// server cannot be reached
    pub async fn new(url: &str) -> Result<Self, AppError> {
        debug!("Connecting to Redis");

        let client = Client::open(url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            AppError::CacheConnection(format!("Invalid Redis URL: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to establish Redis connection: {}", e);
            AppError::CacheConnection(format!("Connection failed: {}", e))
        })?;

        debug!("Redis connection established successfully");
        Ok(Self { manager })
    }

    /// Ping the Redis server to check connectivity
    pub async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis ping failed: {}", e);
                AppError::Cache(format!("Ping failed: {}", e))
            })?;
        Ok(())
    }

    #[cfg(test)]
    async fn flush_db(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_redis_error)?;
        Ok(())
    }

    fn map_redis_error(err: RedisError) -> AppError {
        match err.kind() {
            redis::ErrorKind::IoError => {
                error!("Redis I/O error: {}", err);
                AppError::CacheConnection(format!("I/O error: {}", err))
            }
            redis::ErrorKind::TypeError => {
                warn!("Redis type error: {}", err);
                AppError::Cache(format!("Type mismatch: {}", err))
            }
            _ => {
                error!("Redis error: {}", err);
                AppError::Cache(err.to_string())
            }
        }
    }
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        debug!("GET {}", key);
        let mut conn = self.manager.clone();

        let result: Option<String> = conn.get(key).await.map_err(Self::map_redis_error)?;

        match result {
            Some(json) => {
                let value = serde_json::from_str::<T>(&json).map_err(|e| {
                    error!("Failed to deserialize value for key {}: {}", key, e);
                    AppError::Serialization(format!("Deserialization failed: {}", e))
                })?;
                debug!("Cache HIT: {}", key);
                Ok(Some(value))
            }
            None => {
                debug!("Cache MISS: {}", key);
                Ok(None)
            }
        }
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AppError> {
        debug!("SET {} (TTL: {}s)", key, ttl_secs);
        let mut conn = self.manager.clone();

        let json = serde_json::to_string(value)?;

        let _: () = conn
            .set_ex(key, json, ttl_secs)
            .await
            .map_err(Self::map_redis_error)?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        debug!("DEL {}", key);
        let mut conn = self.manager.clone();

        let deleted: i32 = conn.del(key).await.map_err(Self::map_redis_error)?;

        Ok(deleted > 0)
    }
}
