//! Cache-aside layer
//!
//! Read views (`active`, `discovery`, `detail`) are cached as JSON strings. Every lookup
//! resolves to [`CacheLookup::Hit`] or [`CacheLookup::Miss`]; backend and decode failures
//! are misses, so the cache can never fail a request.

#[cfg(feature = "cache-memory")]
pub mod memory;
#[cfg(feature = "cache-redis")]
pub mod redis;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{CacheBackendKind, CacheKey, Config};

#[cfg(feature = "cache-memory")]
pub use memory::MemoryCache;
#[cfg(feature = "cache-redis")]
pub use self::redis::RedisCache;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[cfg(feature = "cache-redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Raw string key/value store with per-entry TTL
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError>;

    fn name(&self) -> &'static str;
}

/// Backend used when `CACHE_BACKEND=disabled`: every lookup misses, writes are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCache;

#[async_trait]
impl CacheBackend for DisabledCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _keys: &[String]) -> Result<(), CacheError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Result of a cache read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
}

impl<T> CacheLookup<T> {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

/// Cache-aside wrapper around a [`CacheBackend`]
#[derive(Clone)]
pub struct CacheAside {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
}

impl CacheAside {
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledCache), Duration::from_secs(0))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    #[tracing::instrument(skip(self, key), fields(cache.backend = self.backend.name(), cache.key = %key))]
    pub async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> CacheLookup<T> {
        let raw = match self.backend.get(&key.to_string()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return CacheLookup::Miss,
            Err(e) => {
                tracing::warn!(error = %e, "Cache read failed, treating as miss");
                return CacheLookup::Miss;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => CacheLookup::Hit(value),
            Err(e) => {
                tracing::warn!(error = %e, "Cached value could not be decoded, treating as miss");
                CacheLookup::Miss
            }
        }
    }

    /// Return the cached value for `key`, or run `compute` and store its result.
    ///
    /// Errors from `compute` are returned unchanged and nothing is written back.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let CacheLookup::Hit(value) = self.lookup(key).await {
            tracing::debug!(cache.key = %key, "Cache hit");
            return Ok(value);
        }

        let value = compute().await?;
        self.store(key, &value, ttl.unwrap_or(self.default_ttl)).await;
        Ok(value)
    }

    /// Best-effort write; failures are logged and swallowed.
    pub async fn store<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(cache.key = %key, error = %e, "Failed to encode cache value");
                return;
            }
        };
        if let Err(e) = self.backend.set(&key.to_string(), raw, ttl).await {
            tracing::warn!(cache.key = %key, error = %e, "Cache write failed");
        }
    }

    /// Best-effort delete of every key in `keys`.
    #[tracing::instrument(skip(self, keys), fields(cache.backend = self.backend.name(), cache.keys = keys.len()))]
    pub async fn invalidate(&self, keys: &[CacheKey]) {
        if keys.is_empty() {
            return;
        }
        let raw: Vec<String> = keys.iter().map(ToString::to_string).collect();
        match self.backend.delete(&raw).await {
            Ok(()) => tracing::debug!(keys = ?raw, "Cache keys invalidated"),
            Err(e) => tracing::warn!(keys = ?raw, error = %e, "Cache invalidation failed"),
        }
    }
}

/// Build the cache configured by `CACHE_BACKEND`
pub fn create_cache_backend(config: &Config) -> Result<CacheAside, anyhow::Error> {
    let ttl = Duration::from_secs(config.cache_ttl_seconds);
    let backend: Arc<dyn CacheBackend> = match config.cache_backend {
        #[cfg(feature = "cache-redis")]
        CacheBackendKind::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("REDIS_URL is required for the redis cache backend"))?;
            Arc::new(RedisCache::new(url, RedisCache::DEFAULT_TIMEOUT)?)
        }
        #[cfg(feature = "cache-memory")]
        CacheBackendKind::Memory => Arc::new(MemoryCache::new(config.cache_memory_capacity)),
        CacheBackendKind::Disabled => Arc::new(DisabledCache),
        #[allow(unreachable_patterns)]
        other => anyhow::bail!("Cache backend {:?} is not compiled in", other),
    };

    tracing::info!(backend = backend.name(), ttl_seconds = ttl.as_secs(), "Cache configured");
    Ok(CacheAside::new(backend, ttl))
}
