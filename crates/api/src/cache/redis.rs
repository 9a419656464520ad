//! Redis cache backend.
//!
//! Uses `redis::aio::ConnectionManager`, which multiplexes one connection and
//! reconnects on its own. Pattern deletion walks the keyspace with `SCAN` so
//! the server is never blocked by `KEYS`.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::{CacheError, CacheResult};

/// Upper bound on the startup connection attempt.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis-backed cache.
#[derive(Clone)]
pub struct RedisCache {
    connection_manager: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("connection_manager", &"ConnectionManager")
            .finish()
    }
}

impl RedisCache {
    /// Connect and verify the server answers `PING`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Connection` if the URL is invalid, the server is
    /// unreachable within five seconds, or `PING` fails.
    pub async fn connect(url: &SecretString) -> CacheResult<Self> {
        let client = redis::Client::open(url.expose_secret())
            .map_err(|e| CacheError::Connection(format!("invalid Redis URL: {e}")))?;

        let connection_manager =
            tokio::time::timeout(CONNECT_TIMEOUT, redis::aio::ConnectionManager::new(client))
                .await
                .map_err(|_| CacheError::Connection("timed out connecting to Redis".to_owned()))?
                .map_err(|e| CacheError::Connection(format!("failed to connect to Redis: {e}")))?;

        let cache = Self { connection_manager };
        if !cache.ping().await? {
            return Err(CacheError::Connection("Redis did not answer PING".to_owned()));
        }

        debug!("Redis cache connected");
        Ok(cache)
    }

    pub(super) async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(format!("GET failed: {e}")))
    }

    pub(super) async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(format!("SET failed: {e}")))
    }

    pub(super) async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(format!("DEL failed: {e}")))
    }

    pub(super) async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let mut conn = self.connection_manager.clone();
        let mut deleted: u64 = 0;
        let mut cursor: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| CacheError::Backend(format!("SCAN failed: {e}")))?;

            if !keys.is_empty() {
                let count: u64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| CacheError::Backend(format!("DEL (batch) failed: {e}")))?;
                deleted += count;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(deleted)
    }

    pub(super) async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.connection_manager.clone();
        let count: u64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(format!("EXISTS failed: {e}")))?;
        Ok(count > 0)
    }

    pub(super) async fn ping(&self) -> CacheResult<bool> {
        let mut conn = self.connection_manager.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(format!("PING failed: {e}")))?;
        Ok(pong == "PONG")
    }

    /// Returns `(key count, used memory in bytes)`.
    pub(super) async fn usage(&self) -> CacheResult<(u64, u64)> {
        let mut conn = self.connection_manager.clone();
        let keys: u64 = redis::cmd("DBSIZE")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(format!("DBSIZE failed: {e}")))?;
        let info: String = redis::cmd("INFO")
            .arg("memory")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Backend(format!("INFO failed: {e}")))?;

        Ok((keys, parse_used_memory(&info).unwrap_or(0)))
    }
}

/// Extract `used_memory:<bytes>` from an `INFO memory` reply.
fn parse_used_memory(info: &str) -> Option<u64> {
    info.lines()
        .find_map(|line| line.strip_prefix("used_memory:"))
        .and_then(|v| v.trim().parse().ok())
}

/// TTL in milliseconds for `SET ... PX`, which rejects zero.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}
