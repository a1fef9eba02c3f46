use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::time::timeout;

use super::{CacheBackend, CacheError};

/// Redis-backed cache using a multiplexed async connection per call
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
    timeout: Duration,
}

impl RedisCache {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

    pub fn new(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        Ok(Self { client, timeout })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        match timeout(self.timeout, self.client.get_multiplexed_async_connection()).await {
            Ok(conn) => Ok(conn?),
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        }
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        F: std::future::Future<Output = Result<T, redis::RedisError>>,
    {
        match timeout(self.timeout, op).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        self.bounded(conn.get::<_, Option<String>>(key)).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let seconds = ttl.as_secs().max(1);
        self.bounded(conn.set_ex::<_, _, ()>(key, value, seconds))
            .await
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        self.bounded(conn.del::<_, ()>(keys)).await
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
