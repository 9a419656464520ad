//! Process-local cache backend built on moka.
//!
//! Each entry carries its own TTL through a custom [`Expiry`], so namespaces
//! with different lifetimes can share one cache. Expired entries are never
//! returned by `get`, even before moka's housekeeping physically evicts them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use tracing::debug;

use super::CacheResult;

#[derive(Clone)]
struct Entry {
    value: Arc<str>,
    ttl: Duration,
}

/// Expire each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-memory cache with per-key TTL.
#[derive(Clone)]
pub struct MemoryCache {
    cache: Cache<String, Entry>,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("max_capacity", &self.cache.policy().max_capacity())
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl MemoryCache {
    /// Create an empty cache holding at most `max_capacity` entries.
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        debug!(max_capacity, "In-memory cache created");
        Self { cache }
    }

    pub(super) async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.cache.get(key).await.map(|e| e.value.to_string()))
    }

    pub(super) async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.cache
            .insert(
                key.to_owned(),
                Entry {
                    value: Arc::from(value),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    pub(super) async fn delete(&self, key: &str) -> CacheResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    pub(super) async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let matching: Vec<Arc<String>> = self
            .cache
            .iter()
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| key)
            .collect();

        let mut deleted = 0;
        for key in matching {
            if self.cache.remove(key.as_str()).await.is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    pub(super) async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.cache.get(key).await.is_some())
    }

    /// Returns `(key count, approximate bytes held)`.
    pub(super) async fn usage(&self) -> (u64, u64) {
        self.cache.run_pending_tasks().await;
        let bytes = self
            .cache
            .iter()
            .map(|(key, entry)| (key.len() + entry.value.len()) as u64)
            .sum();
        (self.cache.entry_count(), bytes)
    }
}

/// Match a key against a Redis-style glob where `*` matches any run of
/// characters and `?` matches exactly one.
pub(super) fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0, 0);
    let mut star: Option<usize> = None;
    let mut star_k = 0;

    while k < key.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == key[k]) {
            p += 1;
            k += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            star_k = k;
            p += 1;
        } else if let Some(s) = star {
            // Let the last star absorb one more character
            p = s + 1;
            star_k += 1;
            k = star_k;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("user:profile:*", "user:profile:abc"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("ai:*:x", "ai:weekly-tips:x"));
        assert!(glob_match("*tips*", "ai:weekly-tips:1"));
        assert!(glob_match("ai:?", "ai:1"));
        assert!(!glob_match("ai:?", "ai:12"));
        assert!(!glob_match("user:*", "ai:response:1"));
        assert!(!glob_match("registration:options", "registration:options:x"));
        assert!(glob_match("registration:options", "registration:options"));
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new(100);
        cache.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(cache.exists("k").await.unwrap());

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_entries_honour_their_own_ttl() {
        let cache = MemoryCache::new(100);
        cache
            .set("short", "1", Duration::from_millis(200))
            .await
            .unwrap();
        cache.set("long", "2", Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert_eq!(cache.get("long").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let cache = MemoryCache::new(100);
        let ttl = Duration::from_secs(60);
        cache.set("ai:weekly-tips:1:2026-W01", "a", ttl).await.unwrap();
        cache.set("ai:weekly-tips:1:2026-W02", "b", ttl).await.unwrap();
        cache.set("ai:weekly-tips:2:2026-W01", "c", ttl).await.unwrap();
        cache.set("user:profile:1", "d", ttl).await.unwrap();

        let deleted = cache.delete_pattern("ai:weekly-tips:1:*").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(cache.exists("ai:weekly-tips:2:2026-W01").await.unwrap());
        assert!(cache.exists("user:profile:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_usage_counts_entries() {
        let cache = MemoryCache::new(100);
        cache.set("a", "12345", Duration::from_secs(60)).await.unwrap();
        let (keys, bytes) = cache.usage().await;
        assert_eq!(keys, 1);
        assert_eq!(bytes, 6);
    }
}
