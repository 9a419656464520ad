//! In-memory store backends.
//!
//! Same semantics as the `PostgreSQL` repositories: expired drafts read as
//! absent, and farmer email uniqueness is checked and written under one lock
//! so two concurrent inserts cannot both succeed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;

use agrisathi_core::{Email, FarmerId, SessionId};

use super::RepositoryError;
use crate::models::{
    DraftUpdate, EmailVerification, Farmer, NewFarmer, PasswordReset, ProfileUpdate,
    RegistrationDraft,
};
use crate::services::auth::PasswordHash;

/// Drafts keyed by session id.
#[derive(Debug, Clone)]
pub struct MemoryDraftStore {
    drafts: Arc<RwLock<HashMap<SessionId, RegistrationDraft>>>,
    ttl: TimeDelta,
}

impl MemoryDraftStore {
    /// Empty store whose drafts live `ttl` from first write.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            drafts: Arc::default(),
            ttl: TimeDelta::from_std(ttl).unwrap_or_else(|_| TimeDelta::hours(24)),
        }
    }

    pub(super) async fn find_by_session(&self, session_id: &SessionId) -> Option<RegistrationDraft> {
        let drafts = self.drafts.read().await;
        drafts
            .get(session_id)
            .filter(|d| !d.is_expired(Utc::now()))
            .cloned()
    }

    pub(super) async fn upsert(
        &self,
        session_id: &SessionId,
        update: DraftUpdate,
    ) -> RegistrationDraft {
        let now = Utc::now();
        let mut drafts = self.drafts.write().await;

        if drafts.get(session_id).is_some_and(|d| d.is_expired(now)) {
            drafts.remove(session_id);
        }

        let draft = drafts
            .entry(session_id.clone())
            .or_insert_with(|| RegistrationDraft::new(session_id.clone(), now, now + self.ttl));
        draft.apply(update);
        draft.clone()
    }

    pub(super) async fn delete_by_session(&self, session_id: &SessionId) {
        self.drafts.write().await.remove(session_id);
    }

    pub(super) async fn purge_expired(&self) -> u64 {
        let now = Utc::now();
        let mut drafts = self.drafts.write().await;
        let before = drafts.len();
        drafts.retain(|_, d| !d.is_expired(now));
        (before - drafts.len()) as u64
    }
}

/// Farmers keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MemoryFarmerStore {
    farmers: Arc<RwLock<HashMap<FarmerId, Farmer>>>,
}

impl MemoryFarmerStore {
    pub(super) async fn create(&self, new: NewFarmer) -> Result<Farmer, RepositoryError> {
        let mut farmers = self.farmers.write().await;
        if farmers.values().any(|f| f.email == new.email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let now = Utc::now();
        let farmer = Farmer {
            id: FarmerId::generate(),
            personal_info: new.personal_info,
            location_info: new.location_info,
            farm_info: new.farm_info,
            email: new.email,
            password_hash: new.password_hash,
            preferred_language: new.preferred_language,
            email_verification: EmailVerification::default(),
            password_reset: PasswordReset::default(),
            created_at: now,
            updated_at: now,
        };
        farmers.insert(farmer.id, farmer.clone());
        Ok(farmer)
    }

    pub(super) async fn find_by_id(&self, id: FarmerId) -> Option<Farmer> {
        self.farmers.read().await.get(&id).cloned()
    }

    pub(super) async fn find_by_email(&self, email: &Email) -> Option<Farmer> {
        // `Email` is normalized to lowercase on parse
        self.farmers
            .read()
            .await
            .values()
            .find(|f| &f.email == email)
            .cloned()
    }

    pub(super) async fn update_profile(
        &self,
        id: FarmerId,
        update: &ProfileUpdate,
    ) -> Result<Farmer, RepositoryError> {
        let mut farmers = self.farmers.write().await;
        let farmer = farmers.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        update.apply_to(farmer);
        farmer.updated_at = Utc::now();
        Ok(farmer.clone())
    }

    pub(super) async fn set_verification_token(
        &self,
        id: FarmerId,
        token_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut farmers = self.farmers.write().await;
        let farmer = farmers.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        farmer.email_verification.token_hash = Some(token_hash.to_owned());
        farmer.email_verification.token_expires = Some(expires);
        farmer.updated_at = Utc::now();
        Ok(())
    }

    pub(super) async fn verify_email(&self, token_hash: &str) -> Option<FarmerId> {
        let now = Utc::now();
        let mut farmers = self.farmers.write().await;
        let farmer = farmers.values_mut().find(|f| {
            f.email_verification.token_hash.as_deref() == Some(token_hash)
                && f.email_verification.token_expires.is_some_and(|t| t > now)
        })?;

        farmer.email_verification = EmailVerification {
            is_verified: true,
            token_hash: None,
            token_expires: None,
            verified_at: Some(now),
        };
        farmer.updated_at = now;
        Some(farmer.id)
    }

    pub(super) async fn set_reset_token(
        &self,
        id: FarmerId,
        token_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut farmers = self.farmers.write().await;
        let farmer = farmers.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        farmer.password_reset.token_hash = Some(token_hash.to_owned());
        farmer.password_reset.token_expires = Some(expires);
        farmer.updated_at = Utc::now();
        Ok(())
    }

    pub(super) async fn reset_password(
        &self,
        token_hash: &str,
        password_hash: &PasswordHash,
    ) -> Option<FarmerId> {
        let now = Utc::now();
        let mut farmers = self.farmers.write().await;
        let farmer = farmers.values_mut().find(|f| {
            f.password_reset.token_hash.as_deref() == Some(token_hash)
                && f.password_reset.token_expires.is_some_and(|t| t > now)
        })?;

        farmer.password_hash = password_hash.clone();
        farmer.password_reset = PasswordReset {
            token_hash: None,
            token_expires: None,
            reset_at: Some(now),
        };
        farmer.updated_at = now;
        Some(farmer.id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use agrisathi_core::PreferredLanguage;

    use super::*;
    use crate::models::{FarmProfile, LocationInfo, PersonalInfo};

    fn new_farmer(email: &str) -> NewFarmer {
        NewFarmer {
            personal_info: PersonalInfo {
                first_name: "Sita".into(),
                middle_name: None,
                last_name: "Rai".into(),
            },
            location_info: LocationInfo {
                province: "Koshi".into(),
                district: "Jhapa".into(),
                municipality: "Damak".into(),
            },
            farm_info: FarmProfile {
                farmer_type: "Crop Farming".into(),
                economic_scale: "Subsistence".into(),
            },
            email: Email::parse(email).unwrap(),
            password_hash: PasswordHash::from_stored("$argon2id$stub".into()),
            preferred_language: PreferredLanguage::default(),
        }
    }

    #[tokio::test]
    async fn test_expired_draft_is_unreachable_before_purge() {
        let store = MemoryDraftStore::new(Duration::from_millis(50));
        let id = SessionId::parse("s").unwrap();
        store
            .upsert(&id, DraftUpdate::FarmerType("Livestock".into()))
            .await;
        assert!(store.find_by_session(&id).await.is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(store.find_by_session(&id).await.is_none());
        // Still physically present until purged
        assert_eq!(store.drafts.read().await.len(), 1);
        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.drafts.read().await.len(), 0);
    }

    #[tokio::test]
    async fn test_upsert_after_expiry_starts_fresh() {
        let store = MemoryDraftStore::new(Duration::from_millis(50));
        let id = SessionId::parse("s").unwrap();
        let first = store
            .upsert(&id, DraftUpdate::FarmerType("Livestock".into()))
            .await;

        tokio::time::sleep(Duration::from_millis(80)).await;

        let second = store
            .upsert(&id, DraftUpdate::EconomicScale("Commercial".into()))
            .await;
        assert!(second.farm_info.farmer_type.is_none());
        assert!(second.expires_at > first.expires_at);
    }

    #[tokio::test]
    async fn test_deadline_is_not_extended_by_later_writes() {
        let store = MemoryDraftStore::new(Duration::from_secs(60));
        let id = SessionId::parse("s").unwrap();
        let first = store
            .upsert(&id, DraftUpdate::FarmerType("Livestock".into()))
            .await;
        let second = store
            .upsert(&id, DraftUpdate::EconomicScale("Commercial".into()))
            .await;
        assert_eq!(first.expires_at, second.expires_at);
        assert_eq!(first.created_at, second.created_at);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts_case_insensitively() {
        let store = MemoryFarmerStore::default();
        store.create(new_farmer("sita@example.com")).await.unwrap();
        let result = store.create(new_farmer("SITA@Example.com")).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_concurrent_creates_with_same_email() {
        let store = MemoryFarmerStore::default();
        let (a, b) = tokio::join!(
            store.create(new_farmer("race@example.com")),
            store.create(new_farmer("race@example.com")),
        );
        assert!(a.is_ok() ^ b.is_ok());
        assert_eq!(store.farmers.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_verification_token_is_single_use() {
        let store = MemoryFarmerStore::default();
        let farmer = store.create(new_farmer("v@example.com")).await.unwrap();
        let expires = Utc::now() + TimeDelta::hours(1);
        store
            .set_verification_token(farmer.id, "hash", expires)
            .await
            .unwrap();

        assert_eq!(store.verify_email("hash").await, Some(farmer.id));
        assert_eq!(store.verify_email("hash").await, None);
        let stored = store.find_by_id(farmer.id).await.unwrap();
        assert!(stored.email_verification.is_verified);
    }

    #[tokio::test]
    async fn test_expired_reset_token_is_rejected() {
        let store = MemoryFarmerStore::default();
        let farmer = store.create(new_farmer("r@example.com")).await.unwrap();
        let expired = Utc::now() - TimeDelta::seconds(1);
        store.set_reset_token(farmer.id, "hash", expired).await.unwrap();

        let new_hash = PasswordHash::from_stored("$argon2id$new".into());
        assert_eq!(store.reset_password("hash", &new_hash).await, None);
    }
}
