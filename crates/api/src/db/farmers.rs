//! Farmer store.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use agrisathi_core::{Email, FarmerId, PreferredLanguage};

use super::{MemoryFarmerStore, RepositoryError, map_unique_violation};
use crate::models::{
    EmailVerification, FarmProfile, Farmer, LocationInfo, NewFarmer, PasswordReset, PersonalInfo,
    ProfileUpdate,
};
use crate::services::auth::PasswordHash;

/// Store for registered farmers.
///
/// Email uniqueness (case-insensitive) is enforced by the store itself, not
/// only by callers checking first.
#[derive(Debug, Clone)]
pub enum FarmerStore {
    /// `PostgreSQL` table `farmer`.
    Postgres(PgFarmerStore),
    /// Process-local map.
    Memory(MemoryFarmerStore),
}

impl FarmerStore {
    /// Farmers in `PostgreSQL`.
    #[must_use]
    pub const fn postgres(pool: PgPool) -> Self {
        Self::Postgres(PgFarmerStore::new(pool))
    }

    /// Farmers in process memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::Memory(MemoryFarmerStore::default())
    }

    /// Insert a new farmer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, farmer: NewFarmer) -> Result<Farmer, RepositoryError> {
        match self {
            Self::Postgres(s) => s.create(farmer).await,
            Self::Memory(s) => s.create(farmer).await,
        }
    }

    /// Get a farmer by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend fails or holds invalid data.
    pub async fn find_by_id(&self, id: FarmerId) -> Result<Option<Farmer>, RepositoryError> {
        match self {
            Self::Postgres(s) => s.find_by_id(id).await,
            Self::Memory(s) => Ok(s.find_by_id(id).await),
        }
    }

    /// Get a farmer by email (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend fails or holds invalid data.
    pub async fn find_by_email(&self, email: &Email) -> Result<Option<Farmer>, RepositoryError> {
        match self {
            Self::Postgres(s) => s.find_by_email(email).await,
            Self::Memory(s) => Ok(s.find_by_email(email).await),
        }
    }

    /// Whether any farmer uses this email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend fails.
    pub async fn email_exists(&self, email: &Email) -> Result<bool, RepositoryError> {
        match self {
            Self::Postgres(s) => s.email_exists(email).await,
            Self::Memory(s) => Ok(s.find_by_email(email).await.is_some()),
        }
    }

    /// Apply a profile edit, returning the updated farmer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no farmer has this id.
    pub async fn update_profile(
        &self,
        id: FarmerId,
        update: &ProfileUpdate,
    ) -> Result<Farmer, RepositoryError> {
        match self {
            Self::Postgres(s) => s.update_profile(id, update).await,
            Self::Memory(s) => s.update_profile(id, update).await,
        }
    }

    /// Store the hash of a new email verification token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no farmer has this id.
    pub async fn set_verification_token(
        &self,
        id: FarmerId,
        token_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(s) => s.set_verification_token(id, token_hash, expires).await,
            Self::Memory(s) => s.set_verification_token(id, token_hash, expires).await,
        }
    }

    /// Mark the owner of an unexpired verification token as verified and
    /// consume the token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend fails.
    pub async fn verify_email(&self, token_hash: &str) -> Result<Option<FarmerId>, RepositoryError> {
        match self {
            Self::Postgres(s) => s.verify_email(token_hash).await,
            Self::Memory(s) => Ok(s.verify_email(token_hash).await),
        }
    }

    /// Store the hash of a new password reset token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no farmer has this id.
    pub async fn set_reset_token(
        &self,
        id: FarmerId,
        token_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(s) => s.set_reset_token(id, token_hash, expires).await,
            Self::Memory(s) => s.set_reset_token(id, token_hash, expires).await,
        }
    }

    /// Replace the password of the owner of an unexpired reset token and
    /// consume the token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the backend fails.
    pub async fn reset_password(
        &self,
        token_hash: &str,
        password_hash: &PasswordHash,
    ) -> Result<Option<FarmerId>, RepositoryError> {
        match self {
            Self::Postgres(s) => s.reset_password(token_hash, password_hash).await,
            Self::Memory(s) => Ok(s.reset_password(token_hash, password_hash).await),
        }
    }

    /// Check the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the database does not answer.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(s) => s.ping().await,
            Self::Memory(_) => Ok(()),
        }
    }
}

const FARMER_COLUMNS: &str = "id, first_name, middle_name, last_name, province, district, \
     municipality, farmer_type, economic_scale, email, password_hash, preferred_language, \
     email_verified, verification_token_hash, verification_token_expires, verified_at, \
     reset_token_hash, reset_token_expires, reset_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct FarmerRow {
    id: Uuid,
    first_name: String,
    middle_name: Option<String>,
    last_name: String,
    province: String,
    district: String,
    municipality: String,
    farmer_type: String,
    economic_scale: String,
    email: String,
    password_hash: String,
    preferred_language: String,
    email_verified: bool,
    verification_token_hash: Option<String>,
    verification_token_expires: Option<DateTime<Utc>>,
    verified_at: Option<DateTime<Utc>>,
    reset_token_hash: Option<String>,
    reset_token_expires: Option<DateTime<Utc>>,
    reset_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FarmerRow> for Farmer {
    type Error = RepositoryError;

    fn try_from(row: FarmerRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let preferred_language = PreferredLanguage::parse(&row.preferred_language)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        Ok(Self {
            id: FarmerId::new(row.id),
            personal_info: PersonalInfo {
                first_name: row.first_name,
                middle_name: row.middle_name,
                last_name: row.last_name,
            },
            location_info: LocationInfo {
                province: row.province,
                district: row.district,
                municipality: row.municipality,
            },
            farm_info: FarmProfile {
                farmer_type: row.farmer_type,
                economic_scale: row.economic_scale,
            },
            email,
            password_hash: PasswordHash::from_stored(row.password_hash),
            preferred_language,
            email_verification: EmailVerification {
                is_verified: row.email_verified,
                token_hash: row.verification_token_hash,
                token_expires: row.verification_token_expires,
                verified_at: row.verified_at,
            },
            password_reset: PasswordReset {
                token_hash: row.reset_token_hash,
                token_expires: row.reset_token_expires,
                reset_at: row.reset_at,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// `PostgreSQL` farmer repository.
#[derive(Debug, Clone)]
pub struct PgFarmerStore {
    pool: PgPool,
}

impl PgFarmerStore {
    /// Create a new farmer repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn create(&self, farmer: NewFarmer) -> Result<Farmer, RepositoryError> {
        let sql = format!(
            "INSERT INTO farmer (id, first_name, middle_name, last_name, province, district, \
                 municipality, farmer_type, economic_scale, email, password_hash, preferred_language) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {FARMER_COLUMNS}"
        );

        let row = sqlx::query_as::<_, FarmerRow>(&sql)
            .bind(FarmerId::generate().as_uuid())
            .bind(&farmer.personal_info.first_name)
            .bind(&farmer.personal_info.middle_name)
            .bind(&farmer.personal_info.last_name)
            .bind(&farmer.location_info.province)
            .bind(&farmer.location_info.district)
            .bind(&farmer.location_info.municipality)
            .bind(&farmer.farm_info.farmer_type)
            .bind(&farmer.farm_info.economic_scale)
            .bind(farmer.email.as_str())
            .bind(farmer.password_hash.as_str())
            .bind(farmer.preferred_language.code())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "email"))?;

        Farmer::try_from(row)
    }

    async fn find_by_id(&self, id: FarmerId) -> Result<Option<Farmer>, RepositoryError> {
        let sql = format!("SELECT {FARMER_COLUMNS} FROM farmer WHERE id = $1");
        sqlx::query_as::<_, FarmerRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Farmer::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Farmer>, RepositoryError> {
        let sql = format!("SELECT {FARMER_COLUMNS} FROM farmer WHERE lower(email) = lower($1)");
        sqlx::query_as::<_, FarmerRow>(&sql)
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(Farmer::try_from)
            .transpose()
    }

    async fn email_exists(&self, email: &Email) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM farmer WHERE lower(email) = lower($1))")
                .bind(email.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn update_profile(
        &self,
        id: FarmerId,
        update: &ProfileUpdate,
    ) -> Result<Farmer, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {FARMER_COLUMNS} FROM farmer WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, FarmerRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let mut farmer = Farmer::try_from(row)?;
        update.apply_to(&mut farmer);

        let sql = format!(
            "UPDATE farmer SET first_name = $2, middle_name = $3, last_name = $4, \
                 province = $5, district = $6, municipality = $7, farmer_type = $8, \
                 economic_scale = $9, preferred_language = $10, updated_at = now() \
             WHERE id = $1 \
             RETURNING {FARMER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, FarmerRow>(&sql)
            .bind(id.as_uuid())
            .bind(&farmer.personal_info.first_name)
            .bind(&farmer.personal_info.middle_name)
            .bind(&farmer.personal_info.last_name)
            .bind(&farmer.location_info.province)
            .bind(&farmer.location_info.district)
            .bind(&farmer.location_info.municipality)
            .bind(&farmer.farm_info.farmer_type)
            .bind(&farmer.farm_info.economic_scale)
            .bind(farmer.preferred_language.code())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Farmer::try_from(row)
    }

    async fn set_verification_token(
        &self,
        id: FarmerId,
        token_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE farmer SET verification_token_hash = $2, verification_token_expires = $3, \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(token_hash)
        .bind(expires)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn verify_email(&self, token_hash: &str) -> Result<Option<FarmerId>, RepositoryError> {
        let id: Option<Uuid> = sqlx::query_scalar(
            "UPDATE farmer SET email_verified = TRUE, verified_at = now(), \
                 verification_token_hash = NULL, verification_token_expires = NULL, \
                 updated_at = now() \
             WHERE verification_token_hash = $1 AND verification_token_expires > now() \
             RETURNING id",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id.map(FarmerId::new))
    }

    async fn set_reset_token(
        &self,
        id: FarmerId,
        token_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE farmer SET reset_token_hash = $2, reset_token_expires = $3, \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(token_hash)
        .bind(expires)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn reset_password(
        &self,
        token_hash: &str,
        password_hash: &PasswordHash,
    ) -> Result<Option<FarmerId>, RepositoryError> {
        let id: Option<Uuid> = sqlx::query_scalar(
            "UPDATE farmer SET password_hash = $2, reset_at = now(), \
                 reset_token_hash = NULL, reset_token_expires = NULL, updated_at = now() \
             WHERE reset_token_hash = $1 AND reset_token_expires > now() \
             RETURNING id",
        )
        .bind(token_hash)
        .bind(password_hash.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(id.map(FarmerId::new))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
