//! Registration draft and step types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agrisathi_core::{Email, SessionId};

/// The six registration steps plus the initial state.
///
/// Serialized as its step number (`0`..=`6`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RegistrationStep {
    /// Nothing submitted yet.
    #[default]
    NotStarted = 0,
    /// First, middle and last name.
    Name = 1,
    /// Province, district and municipality.
    Location = 2,
    /// Kind of farming.
    AgricultureType = 3,
    /// Scale of the farming operation.
    EconomicScale = 4,
    /// Login email.
    Email = 5,
    /// Permanent farmer record created.
    Complete = 6,
}

/// Error for a step number outside `0..=6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid registration step: {0}")]
pub struct InvalidStep(pub i64);

impl RegistrationStep {
    /// Step number as shown to clients.
    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8
    }

    /// The step a client should submit after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::NotStarted => Self::Name,
            Self::Name => Self::Location,
            Self::Location => Self::AgricultureType,
            Self::AgricultureType => Self::EconomicScale,
            Self::EconomicScale => Self::Email,
            Self::Email | Self::Complete => Self::Complete,
        }
    }
}

impl From<RegistrationStep> for u8 {
    fn from(step: RegistrationStep) -> Self {
        step.number()
    }
}

impl TryFrom<u8> for RegistrationStep {
    type Error = InvalidStep;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

impl TryFrom<i64> for RegistrationStep {
    type Error = InvalidStep;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::NotStarted,
            1 => Self::Name,
            2 => Self::Location,
            3 => Self::AgricultureType,
            4 => Self::EconomicScale,
            5 => Self::Email,
            6 => Self::Complete,
            other => return Err(InvalidStep(other)),
        })
    }
}

/// Name group (step 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
}

/// Location group (step 2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    pub province: String,
    pub district: String,
    pub municipality: String,
}

/// Farm group as collected by steps 3 and 4; each half is set independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farmer_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub economic_scale: Option<String>,
}

impl FarmInfo {
    /// Both halves, if both are present.
    #[must_use]
    pub fn complete(&self) -> Option<(String, String)> {
        Some((self.farmer_type.clone()?, self.economic_scale.clone()?))
    }
}

/// Credentials held by a draft. The password is never stored in a draft; it
/// arrives with the completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftCredentials {
    pub email: Email,
}

/// A partially-filled registration, keyed by session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDraft {
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_info: Option<PersonalInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_info: Option<LocationInfo>,
    pub farm_info: FarmInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_credentials: Option<DraftCredentials>,
    pub current_step: RegistrationStep,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RegistrationDraft {
    /// A fresh draft with nothing collected yet.
    #[must_use]
    pub fn new(session_id: SessionId, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            personal_info: None,
            location_info: None,
            farm_info: FarmInfo::default(),
            login_credentials: None,
            current_step: RegistrationStep::NotStarted,
            created_at: now,
            expires_at,
        }
    }

    /// Whether the draft is past its fixed deadline.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Apply one step's write.
    ///
    /// Replaces the step's top-level group wholesale, except that the two
    /// farm fields are set independently. The step counter never decreases.
    pub fn apply(&mut self, update: DraftUpdate) {
        let step = update.step();
        match update {
            DraftUpdate::PersonalInfo(info) => self.personal_info = Some(info),
            DraftUpdate::LocationInfo(info) => self.location_info = Some(info),
            DraftUpdate::FarmerType(value) => self.farm_info.farmer_type = Some(value),
            DraftUpdate::EconomicScale(value) => self.farm_info.economic_scale = Some(value),
            DraftUpdate::Email(email) => self.login_credentials = Some(DraftCredentials { email }),
        }
        self.current_step = self.current_step.max(step);
    }
}

/// The write performed by one of steps 1-5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftUpdate {
    PersonalInfo(PersonalInfo),
    LocationInfo(LocationInfo),
    FarmerType(String),
    EconomicScale(String),
    Email(Email),
}

impl DraftUpdate {
    /// The step that produces this write.
    #[must_use]
    pub const fn step(&self) -> RegistrationStep {
        match self {
            Self::PersonalInfo(_) => RegistrationStep::Name,
            Self::LocationInfo(_) => RegistrationStep::Location,
            Self::FarmerType(_) => RegistrationStep::AgricultureType,
            Self::EconomicScale(_) => RegistrationStep::EconomicScale,
            Self::Email(_) => RegistrationStep::Email,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn draft() -> RegistrationDraft {
        let now = Utc::now();
        RegistrationDraft::new(
            SessionId::parse("s1").unwrap(),
            now,
            now + Duration::hours(24),
        )
    }

    #[test]
    fn test_step_serializes_as_number() {
        assert_eq!(serde_json::to_string(&RegistrationStep::Email).unwrap(), "5");
        let step: RegistrationStep = serde_json::from_str("3").unwrap();
        assert_eq!(step, RegistrationStep::AgricultureType);
        assert!(serde_json::from_str::<RegistrationStep>("7").is_err());
    }

    #[test]
    fn test_next_step() {
        assert_eq!(RegistrationStep::Name.next(), RegistrationStep::Location);
        assert_eq!(RegistrationStep::Email.next(), RegistrationStep::Complete);
    }

    #[test]
    fn test_apply_never_moves_step_backwards() {
        let mut d = draft();
        d.apply(DraftUpdate::FarmerType("Crop Farming".into()));
        assert_eq!(d.current_step, RegistrationStep::AgricultureType);

        d.apply(DraftUpdate::PersonalInfo(PersonalInfo {
            first_name: "Sita".into(),
            middle_name: None,
            last_name: "Rai".into(),
        }));
        assert_eq!(d.current_step, RegistrationStep::AgricultureType);
        assert!(d.personal_info.is_some());
    }

    #[test]
    fn test_apply_preserves_other_farm_half() {
        let mut d = draft();
        d.apply(DraftUpdate::FarmerType("Livestock".into()));
        d.apply(DraftUpdate::EconomicScale("Commercial".into()));
        d.apply(DraftUpdate::FarmerType("Mixed Farming".into()));

        assert_eq!(
            d.farm_info.complete(),
            Some(("Mixed Farming".to_string(), "Commercial".to_string()))
        );
    }

    #[test]
    fn test_apply_is_idempotent() {
        let location = LocationInfo {
            province: "Gandaki".into(),
            district: "Kaski".into(),
            municipality: "Pokhara".into(),
        };
        let mut once = draft();
        once.apply(DraftUpdate::LocationInfo(location.clone()));
        let mut twice = once.clone();
        twice.apply(DraftUpdate::LocationInfo(location));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_is_expired() {
        let d = draft();
        assert!(!d.is_expired(Utc::now()));
        assert!(d.is_expired(d.expires_at));
    }
}
