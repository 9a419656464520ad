//! Cache administration against the shared Redis instance.
//!
//! # Usage
//!
//! ```bash
//! # Drop every cached weekly tip
//! agrisathi-cli cache clear 'ai:weekly-tips:*'
//! ```
//!
//! # Environment Variables
//!
//! - `REDIS_URL` - Redis connection string

use agrisathi_api::cache::{CacheStore, CacheTtls};
use agrisathi_api::config::CacheConfig;
use secrecy::SecretString;

use super::CommandError;

/// Delete every key matching `pattern` and print how many went.
///
/// # Errors
///
/// Returns `CommandError` if `REDIS_URL` is unset or unreachable. The
/// in-memory fallback belongs to each API process, so there is nothing to
/// clear without Redis.
pub async fn clear(pattern: &str) -> Result<(), CommandError> {
    dotenvy::dotenv().ok();

    let redis_url = std::env::var("REDIS_URL")
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("REDIS_URL"))?;

    let config = CacheConfig {
        redis_url: Some(redis_url),
        max_capacity: 0,
        ttls: CacheTtls::default(),
    };
    let cache = CacheStore::connect(&config).await;
    if cache.backend_name() != "redis" {
        return Err(CommandError::RedisUnavailable);
    }

    let deleted = cache.delete_pattern(pattern).await;
    tracing::info!(pattern, deleted, "Cache cleared");
    #[allow(clippy::print_stdout)]
    {
        println!("Deleted {deleted} key(s) matching {pattern}");
    }
    Ok(())
}
