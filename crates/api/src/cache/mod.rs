//! Key/value cache with per-key TTL.
//!
//! [`CacheStore`] hides which backend is active: Redis when `REDIS_URL` is
//! set and reachable at startup, otherwise an in-process moka cache with the
//! same TTL semantics. The choice is made once in [`CacheStore::connect`] and
//! never revisited.
//!
//! Callers never see backend failures. Every error is logged and degrades to
//! a miss (reads) or a no-op (writes).

pub mod keys;
mod memory;
mod redis;

use std::future::Future;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::config::CacheConfig;

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;
pub use keys::CacheTtls;

/// Errors raised by a cache backend.
///
/// These stay inside this module; the public [`CacheStore`] API swallows them.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached.
    #[error("cache connection error: {0}")]
    Connection(String),

    /// A command failed on a connected backend.
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Result alias for backend operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Snapshot of the cache backend's state.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Whether the backend answers right now.
    pub connected: bool,
    /// Number of keys held.
    pub key_count: u64,
    /// Approximate memory held, in bytes.
    pub memory_usage: u64,
    /// `"redis"` or `"memory"`.
    pub backend: &'static str,
}

/// A value produced by [`CacheStore::get_or_compute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached<T> {
    /// The cached or freshly computed value.
    pub value: T,
    /// `true` when served from the cache.
    pub cached: bool,
}

#[derive(Clone, Debug)]
enum Backend {
    Redis(RedisCache),
    Memory(MemoryCache),
}

/// Shared cache handle.
///
/// Cheap to clone; all clones address the same backend.
#[derive(Clone, Debug)]
pub struct CacheStore {
    backend: Backend,
}

impl CacheStore {
    /// Select the backend for this process.
    ///
    /// Tries Redis when a URL is configured; on any connection failure logs
    /// the downgrade and falls back to memory.
    pub async fn connect(config: &CacheConfig) -> Self {
        if let Some(url) = &config.redis_url {
            match RedisCache::connect(url).await {
                Ok(redis) => {
                    tracing::info!(backend = "redis", "Cache backend selected");
                    return Self {
                        backend: Backend::Redis(redis),
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Redis unavailable, falling back to in-memory cache"
                    );
                }
            }
        }

        tracing::info!(
            backend = "memory",
            max_capacity = config.max_capacity,
            "Cache backend selected"
        );
        Self::in_memory(config.max_capacity)
    }

    /// In-memory cache, used directly by tests and the fallback path.
    #[must_use]
    pub fn in_memory(max_capacity: u64) -> Self {
        Self {
            backend: Backend::Memory(MemoryCache::new(max_capacity)),
        }
    }

    /// Name of the active backend.
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Redis(_) => "redis",
            Backend::Memory(_) => "memory",
        }
    }

    /// Read and deserialize a value. Misses, expired entries, backend errors
    /// and undecodable values all return `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match &self.backend {
            Backend::Redis(c) => c.get(key).await,
            Backend::Memory(c) => c.get(key).await,
        };

        let raw = match raw {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key, "Cache MISS");
                return None;
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key, "Cache HIT");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                self.delete(key).await;
                None
            }
        }
    }

    /// Serialize and store a value for `ttl`.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache value not serializable");
                return;
            }
        };

        let result = match &self.backend {
            Backend::Redis(c) => c.set(key, &raw, ttl).await,
            Backend::Memory(c) => c.set(key, &raw, ttl).await,
        };
        match result {
            Ok(()) => tracing::debug!(key, ttl_seconds = ttl.as_secs(), "Cache SET"),
            Err(e) => tracing::warn!(key, error = %e, "Cache write failed"),
        }
    }

    /// Remove one key. Removing an absent key is not an error.
    pub async fn delete(&self, key: &str) {
        let result = match &self.backend {
            Backend::Redis(c) => c.delete(key).await,
            Backend::Memory(c) => c.delete(key).await,
        };
        if let Err(e) = result {
            tracing::warn!(key, error = %e, "Cache delete failed");
        }
    }

    /// Remove every key matching a glob pattern (`*` wildcard). Returns the
    /// number of keys removed, `0` on failure.
    pub async fn delete_pattern(&self, pattern: &str) -> u64 {
        let result = match &self.backend {
            Backend::Redis(c) => c.delete_pattern(pattern).await,
            Backend::Memory(c) => c.delete_pattern(pattern).await,
        };
        match result {
            Ok(deleted) => {
                tracing::debug!(pattern, deleted, "Cache pattern DEL");
                deleted
            }
            Err(e) => {
                tracing::warn!(pattern, error = %e, "Cache pattern delete failed");
                0
            }
        }
    }

    /// Whether a live (unexpired) entry exists for `key`.
    pub async fn exists(&self, key: &str) -> bool {
        let result = match &self.backend {
            Backend::Redis(c) => c.exists(key).await,
            Backend::Memory(c) => c.exists(key).await,
        };
        result.unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "Cache exists check failed");
            false
        })
    }

    /// Backend statistics. A Redis backend that stopped answering reports
    /// `connected: false` with zero counts.
    pub async fn stats(&self) -> CacheStats {
        let backend = self.backend_name();
        match &self.backend {
            Backend::Memory(c) => {
                let (key_count, memory_usage) = c.usage().await;
                CacheStats {
                    connected: true,
                    key_count,
                    memory_usage,
                    backend,
                }
            }
            Backend::Redis(c) => match c.usage().await {
                Ok((key_count, memory_usage)) => CacheStats {
                    connected: true,
                    key_count,
                    memory_usage,
                    backend,
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Cache stats unavailable");
                    CacheStats {
                        connected: false,
                        key_count: 0,
                        memory_usage: 0,
                        backend,
                    }
                }
            },
        }
    }

    /// Whether the backend currently answers.
    pub async fn is_connected(&self) -> bool {
        match &self.backend {
            Backend::Memory(_) => true,
            Backend::Redis(c) => c.ping().await.unwrap_or(false),
        }
    }

    /// Cache-aside: return the cached value for `key`, or compute it, store
    /// it for `ttl`, and return it.
    ///
    /// Errors from `compute` propagate and nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns whatever error `compute` returns.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<Cached<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get::<T>(key).await {
            return Ok(Cached {
                value,
                cached: true,
            });
        }

        let value = compute().await?;
        self.set(key, &value, ttl).await;
        Ok(Cached {
            value,
            cached: false,
        })
    }
}
