//! Persistence for registration drafts and farmers.
//!
//! # Tables
//!
//! - `registration_draft` - In-progress registrations keyed by session id,
//!   with a fixed `expires_at` deadline. Reads filter on `expires_at > now()`
//!   so an expired draft is unreachable before it is physically deleted.
//! - `farmer` - Completed registrations. `lower(email)` carries a unique index,
//!   which is the final guard against two concurrent completions with the
//!   same email.
//!
//! Each store has a `PostgreSQL` backend and an in-memory backend with the
//! same semantics. The in-memory one serves tests and database-less
//! development runs.
//!
//! # Migrations
//!
//! Migrations live in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p agrisathi-cli -- migrate
//! ```

pub mod drafts;
pub mod farmers;
mod memory;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::task::JoinHandle;

pub use drafts::{DraftStore, PgDraftStore};
pub use farmers::{FarmerStore, PgFarmerStore};
pub use memory::{MemoryDraftStore, MemoryFarmerStore};

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// How often the background sweeper deletes expired drafts.
pub const DRAFT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique violation to `Conflict`, anything else to `Database`.
pub(crate) fn map_unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Periodically delete expired drafts.
///
/// Reads already ignore expired drafts; this only reclaims the space.
pub fn spawn_draft_sweeper(store: DraftStore, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "Purged expired registration drafts"),
                Err(e) => tracing::warn!(error = %e, "Draft sweep failed"),
            }
        }
    })
}
