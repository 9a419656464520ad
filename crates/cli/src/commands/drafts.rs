//! Registration draft maintenance.
//!
//! The API sweeps expired drafts on its own; this command is for databases
//! whose API instances are stopped.
//!
//! # Usage
//!
//! ```bash
//! agrisathi-cli drafts purge
//! ```

use std::time::Duration;

use agrisathi_api::db::{self, DraftStore};

use super::{CommandError, database_url};

/// Delete every expired draft and print how many went.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or the delete fails.
pub async fn purge() -> Result<(), CommandError> {
    let pool = db::create_pool(&database_url()?).await?;

    // Purging reads only `expires_at`; the TTL for new drafts is irrelevant
    let store = DraftStore::postgres(pool, Duration::ZERO);
    let purged = store.purge_expired().await?;

    tracing::info!(purged, "Expired drafts purged");
    #[allow(clippy::print_stdout)]
    {
        println!("Purged {purged} expired registration draft(s)");
    }
    Ok(())
}
