//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! agrisathi-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `AGRISATHI_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Embedded from `crates/api/migrations/`:
//! ```
//! migrations/
//! ├── 20261018000001_create_farmer.sql
//! └── 20261018000002_create_registration_draft.sql
//! ```

use agrisathi_api::db;

use super::{CommandError, database_url};

/// Run every pending migration.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Running migrations...");
    db::MIGRATOR.run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
