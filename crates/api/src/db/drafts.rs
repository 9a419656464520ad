//! Registration draft store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use agrisathi_core::SessionId;

use super::{MemoryDraftStore, RepositoryError};
use crate::models::{
    DraftCredentials, DraftUpdate, FarmInfo, LocationInfo, PersonalInfo, RegistrationDraft,
    RegistrationStep,
};

/// Store for in-progress registrations.
///
/// The backend is chosen once at startup.
#[derive(Debug, Clone)]
pub enum DraftStore {
    /// `PostgreSQL` table `registration_draft`.
    Postgres(PgDraftStore),
    /// Process-local map.
    Memory(MemoryDraftStore),
}

impl DraftStore {
    /// Drafts in `PostgreSQL`, each living `ttl` from first write.
    #[must_use]
    pub const fn postgres(pool: PgPool, ttl: Duration) -> Self {
        Self::Postgres(PgDraftStore::new(pool, ttl))
    }

    /// Drafts in process memory, each living `ttl` from first write.
    #[must_use]
    pub fn in_memory(ttl: Duration) -> Self {
        Self::Memory(MemoryDraftStore::new(ttl))
    }

    /// Look up a live draft. Expired drafts read as `None` even if they have
    /// not been purged yet.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend fails or holds invalid data.
    pub async fn find_by_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<RegistrationDraft>, RepositoryError> {
        match self {
            Self::Postgres(s) => s.find_by_session(session_id).await,
            Self::Memory(s) => Ok(s.find_by_session(session_id).await),
        }
    }

    /// Apply one step's write, creating the draft if it does not exist (or
    /// only exists expired). A new draft's deadline is fixed at creation and
    /// later writes never extend it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend fails.
    pub async fn upsert(
        &self,
        session_id: &SessionId,
        update: DraftUpdate,
    ) -> Result<RegistrationDraft, RepositoryError> {
        match self {
            Self::Postgres(s) => s.upsert(session_id, update).await,
            Self::Memory(s) => Ok(s.upsert(session_id, update).await),
        }
    }

    /// Delete a draft. Deleting an absent draft is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend fails.
    pub async fn delete_by_session(&self, session_id: &SessionId) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(s) => s.delete_by_session(session_id).await,
            Self::Memory(s) => {
                s.delete_by_session(session_id).await;
                Ok(())
            }
        }
    }

    /// Physically delete every expired draft, returning how many went.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend fails.
    pub async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        match self {
            Self::Postgres(s) => s.purge_expired().await,
            Self::Memory(s) => Ok(s.purge_expired().await),
        }
    }
}

const DRAFT_COLUMNS: &str = "session_id, personal_info, location_info, farm_info, \
                             login_credentials, current_step, created_at, expires_at";

#[derive(sqlx::FromRow)]
struct DraftRow {
    session_id: String,
    personal_info: Option<Json<PersonalInfo>>,
    location_info: Option<Json<LocationInfo>>,
    farm_info: Json<FarmInfo>,
    login_credentials: Option<Json<DraftCredentials>>,
    current_step: i16,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<DraftRow> for RegistrationDraft {
    type Error = RepositoryError;

    fn try_from(row: DraftRow) -> Result<Self, Self::Error> {
        let session_id = SessionId::parse(&row.session_id).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid session id in database: {e}"))
        })?;
        let current_step = RegistrationStep::try_from(i64::from(row.current_step))
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        Ok(Self {
            session_id,
            personal_info: row.personal_info.map(|j| j.0),
            location_info: row.location_info.map(|j| j.0),
            farm_info: row.farm_info.0,
            login_credentials: row.login_credentials.map(|j| j.0),
            current_step,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

/// `PostgreSQL` draft repository.
#[derive(Debug, Clone)]
pub struct PgDraftStore {
    pool: PgPool,
    ttl: Duration,
}

impl PgDraftStore {
    /// Create a new draft repository.
    #[must_use]
    pub const fn new(pool: PgPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    async fn find_by_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<RegistrationDraft>, RepositoryError> {
        let sql = format!(
            "SELECT {DRAFT_COLUMNS} FROM registration_draft \
             WHERE session_id = $1 AND expires_at > now()"
        );
        sqlx::query_as::<_, DraftRow>(&sql)
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(RegistrationDraft::try_from)
            .transpose()
    }

    async fn upsert(
        &self,
        session_id: &SessionId,
        update: DraftUpdate,
    ) -> Result<RegistrationDraft, RepositoryError> {
        let step = i16::from(update.step().number());

        // Each step owns one column. The two farm fields share `farm_info`
        // and are merged key-by-key so neither overwrites the other.
        let (column, value, merged) = match update {
            DraftUpdate::PersonalInfo(info) => {
                ("personal_info", to_json(&info)?, "EXCLUDED.personal_info")
            }
            DraftUpdate::LocationInfo(info) => {
                ("location_info", to_json(&info)?, "EXCLUDED.location_info")
            }
            DraftUpdate::FarmerType(value) => (
                "farm_info",
                serde_json::json!({ "farmerType": value }),
                "registration_draft.farm_info || EXCLUDED.farm_info",
            ),
            DraftUpdate::EconomicScale(value) => (
                "farm_info",
                serde_json::json!({ "economicScale": value }),
                "registration_draft.farm_info || EXCLUDED.farm_info",
            ),
            DraftUpdate::Email(email) => (
                "login_credentials",
                to_json(&DraftCredentials { email })?,
                "EXCLUDED.login_credentials",
            ),
        };

        let sql = format!(
            "INSERT INTO registration_draft (session_id, {column}, current_step, expires_at) \
             VALUES ($1, $2, $3, now() + make_interval(secs => $4)) \
             ON CONFLICT (session_id) DO UPDATE SET \
                 {column} = {merged}, \
                 current_step = GREATEST(registration_draft.current_step, EXCLUDED.current_step) \
             RETURNING {DRAFT_COLUMNS}"
        );

        let mut tx = self.pool.begin().await?;

        // An expired row must not be revived with its old deadline
        sqlx::query("DELETE FROM registration_draft WHERE session_id = $1 AND expires_at <= now()")
            .bind(session_id.as_str())
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, DraftRow>(&sql)
            .bind(session_id.as_str())
            .bind(&value)
            .bind(step)
            .bind(self.ttl.as_secs_f64())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        RegistrationDraft::try_from(row)
    }

    async fn delete_by_session(&self, session_id: &SessionId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM registration_draft WHERE session_id = $1")
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM registration_draft WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, RepositoryError> {
    serde_json::to_value(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("unserializable draft group: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_then_find() {
        let store = DraftStore::in_memory(Duration::from_secs(60));
        let draft = store
            .upsert(&sid("a"), DraftUpdate::FarmerType("Livestock".into()))
            .await
            .unwrap();
        assert_eq!(draft.current_step, RegistrationStep::AgricultureType);

        let found = store.find_by_session(&sid("a")).await.unwrap().unwrap();
        assert_eq!(found, draft);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = DraftStore::in_memory(Duration::from_secs(60));
        store.delete_by_session(&sid("missing")).await.unwrap();
        store
            .upsert(&sid("a"), DraftUpdate::FarmerType("Livestock".into()))
            .await
            .unwrap();
        store.delete_by_session(&sid("a")).await.unwrap();
        store.delete_by_session(&sid("a")).await.unwrap();
        assert!(store.find_by_session(&sid("a")).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL at DATABASE_URL with migrations applied"]
    async fn test_postgres_upsert_merges_farm_info() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = PgPool::connect(&url).await.unwrap();
        let store = DraftStore::postgres(pool, Duration::from_secs(60));
        let id = SessionId::generate();

        store
            .upsert(&id, DraftUpdate::FarmerType("Livestock".into()))
            .await
            .unwrap();
        let draft = store
            .upsert(&id, DraftUpdate::EconomicScale("Commercial".into()))
            .await
            .unwrap();

        assert_eq!(draft.farm_info.farmer_type.as_deref(), Some("Livestock"));
        assert_eq!(draft.farm_info.economic_scale.as_deref(), Some("Commercial"));
        assert_eq!(draft.current_step, RegistrationStep::EconomicScale);

        store.delete_by_session(&id).await.unwrap();
    }
}
