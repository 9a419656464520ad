//! Permanent farmer records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agrisathi_core::{Email, FarmerId, PreferredLanguage};

use super::registration::{LocationInfo, PersonalInfo};
use crate::services::auth::PasswordHash;

/// Farm group of a completed registration; both fields are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmProfile {
    pub farmer_type: String,
    pub economic_scale: String,
}

/// Email verification state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailVerification {
    pub is_verified: bool,
    /// SHA-256 of the outstanding token, never the token itself.
    pub token_hash: Option<String>,
    pub token_expires: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Password reset state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordReset {
    /// SHA-256 of the outstanding token, never the token itself.
    pub token_hash: Option<String>,
    pub token_expires: Option<DateTime<Utc>>,
    pub reset_at: Option<DateTime<Utc>>,
}

/// A registered farmer.
///
/// Deliberately not `Serialize`: responses go through [`FarmerProfile`],
/// which has no password field.
#[derive(Debug, Clone)]
pub struct Farmer {
    pub id: FarmerId,
    pub personal_info: PersonalInfo,
    pub location_info: LocationInfo,
    pub farm_info: FarmProfile,
    pub email: Email,
    pub password_hash: PasswordHash,
    pub preferred_language: PreferredLanguage,
    pub email_verification: EmailVerification,
    pub password_reset: PasswordReset,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create a [`Farmer`].
#[derive(Debug, Clone)]
pub struct NewFarmer {
    pub personal_info: PersonalInfo,
    pub location_info: LocationInfo,
    pub farm_info: FarmProfile,
    pub email: Email,
    pub password_hash: PasswordHash,
    pub preferred_language: PreferredLanguage,
}

/// Public view of a farmer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerProfile {
    pub id: FarmerId,
    pub personal_info: PersonalInfo,
    pub location_info: LocationInfo,
    pub farm_info: FarmProfile,
    pub email: Email,
    pub email_verified: bool,
    pub preferred_language: PreferredLanguage,
    pub created_at: DateTime<Utc>,
}

impl From<&Farmer> for FarmerProfile {
    fn from(farmer: &Farmer) -> Self {
        Self {
            id: farmer.id,
            personal_info: farmer.personal_info.clone(),
            location_info: farmer.location_info.clone(),
            farm_info: farmer.farm_info.clone(),
            email: farmer.email.clone(),
            email_verified: farmer.email_verification.is_verified,
            preferred_language: farmer.preferred_language,
            created_at: farmer.created_at,
        }
    }
}

/// Editable profile fields. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileUpdate {
    pub personal_info: Option<PersonalInfo>,
    pub location_info: Option<LocationInfo>,
    pub farm_info: Option<FarmProfile>,
    pub preferred_language: Option<PreferredLanguage>,
}

impl ProfileUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.personal_info.is_none()
            && self.location_info.is_none()
            && self.farm_info.is_none()
            && self.preferred_language.is_none()
    }

    /// Apply the update to a farmer in place.
    pub fn apply_to(&self, farmer: &mut Farmer) {
        if let Some(info) = &self.personal_info {
            farmer.personal_info = info.clone();
        }
        if let Some(info) = &self.location_info {
            farmer.location_info = info.clone();
        }
        if let Some(info) = &self.farm_info {
            farmer.farm_info = info.clone();
        }
        if let Some(language) = self.preferred_language {
            farmer.preferred_language = language;
        }
    }
}
