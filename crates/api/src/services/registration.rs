//! Multi-step farmer registration.
//!
//! Steps 1-5 are idempotent upserts into a session-keyed draft; any of them
//! may open the draft. Step 6 turns a complete draft (or a fully inlined
//! profile) into a permanent [`Farmer`] and discards the draft.
//!
//! Every step validates before touching storage, so a rejected step leaves
//! the draft exactly as it was.

use serde::Deserialize;
use thiserror::Error;

use agrisathi_core::{Email, PreferredLanguage, SessionId};

use crate::db::{DraftStore, FarmerStore, RepositoryError};
use crate::models::{
    DraftUpdate, FarmProfile, Farmer, LocationInfo, NewFarmer, PersonalInfo, RegistrationDraft,
    RegistrationStep,
};
use crate::services::auth::{AccountService, AuthError, JwtService, PasswordHash};
use crate::services::email::EmailService;

/// Errors from the registration flow.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// A required field for the step is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// The email belongs to an existing farmer.
    #[error("Email already registered")]
    EmailAlreadyRegistered,

    /// No live draft for the session.
    #[error("Registration session not found or expired")]
    SessionNotFound,

    /// Token issuing or password hashing failed.
    #[error(transparent)]
    Auth(AuthError),

    /// Storage failed.
    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for RegistrationError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Conflict(_) => Self::EmailAlreadyRegistered,
            other => Self::Repository(other),
        }
    }
}

impl From<AuthError> for RegistrationError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::WeakPassword(msg) => Self::Validation(msg),
            AuthError::InvalidEmail(_) => Self::Validation("Invalid email address".to_owned()),
            AuthError::Repository(inner) => inner.into(),
            other => Self::Auth(other),
        }
    }
}

/// Step 1 payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameStep {
    pub session_id: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
}

/// Step 2 payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationStep {
    pub session_id: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub municipality: Option<String>,
}

/// Step 3 payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgricultureTypeStep {
    pub session_id: Option<String>,
    #[serde(alias = "agricultureType")]
    pub farmer_type: Option<String>,
}

/// Step 4 payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomicScaleStep {
    pub session_id: Option<String>,
    #[serde(alias = "farmingScale")]
    pub economic_scale: Option<String>,
}

/// Step 5 payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailStep {
    pub session_id: Option<String>,
    pub email: Option<String>,
}

/// Inline personal info for step 6; fields checked by the service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfoInput {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
}

/// Inline location info for step 6.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfoInput {
    pub province: Option<String>,
    pub district: Option<String>,
    pub municipality: Option<String>,
}

/// Inline farm info for step 6.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmInfoInput {
    #[serde(alias = "agricultureType")]
    pub farmer_type: Option<String>,
    #[serde(alias = "farmingScale")]
    pub economic_scale: Option<String>,
}

/// Inline credentials for step 6.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Step 6 payload: either `sessionId` + `password`, or a full inline profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRegistration {
    pub session_id: Option<String>,
    pub password: Option<String>,
    pub personal_info: Option<PersonalInfoInput>,
    pub location_info: Option<LocationInfoInput>,
    pub farm_info: Option<FarmInfoInput>,
    pub login_credentials: Option<CredentialsInput>,
    pub preferred_language: Option<PreferredLanguage>,
}

impl CompleteRegistration {
    fn has_inline_profile(&self) -> bool {
        self.personal_info.is_some()
            || self.location_info.is_some()
            || self.farm_info.is_some()
            || self.login_credentials.is_some()
    }
}

/// Result of one of steps 1-5.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step: RegistrationStep,
    pub draft: RegistrationDraft,
}

/// Result of step 6.
#[derive(Debug, Clone)]
pub struct Completion {
    pub farmer: Farmer,
    pub token: String,
    pub session_id: Option<SessionId>,
}

/// Registration service.
pub struct RegistrationService<'a> {
    drafts: &'a DraftStore,
    farmers: &'a FarmerStore,
    jwt: &'a JwtService,
    email: &'a EmailService,
}

impl<'a> RegistrationService<'a> {
    /// Create a new registration service.
    #[must_use]
    pub const fn new(
        drafts: &'a DraftStore,
        farmers: &'a FarmerStore,
        jwt: &'a JwtService,
        email: &'a EmailService,
    ) -> Self {
        Self {
            drafts,
            farmers,
            jwt,
            email,
        }
    }

    /// Step 1: name.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::Validation` if first or last name is missing.
    pub async fn save_name(&self, input: NameStep) -> Result<StepOutcome, RegistrationError> {
        let (Some(first_name), Some(last_name)) = (
            non_empty(input.first_name.as_deref()),
            non_empty(input.last_name.as_deref()),
        ) else {
            return Err(validation("First name and last name are required"));
        };
        let info = PersonalInfo {
            first_name,
            middle_name: non_empty(input.middle_name.as_deref()),
            last_name,
        };
        self.save(input.session_id.as_deref(), DraftUpdate::PersonalInfo(info))
            .await
    }

    /// Step 2: location.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::Validation` if any location field is missing.
    pub async fn save_location(&self, input: LocationStep) -> Result<StepOutcome, RegistrationError> {
        let info = location(
            input.province.as_deref(),
            input.district.as_deref(),
            input.municipality.as_deref(),
        )
        .ok_or_else(|| validation("Province, district, and municipality are required"))?;
        self.save(input.session_id.as_deref(), DraftUpdate::LocationInfo(info))
            .await
    }

    /// Step 3: agriculture type.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::Validation` if the type is missing.
    pub async fn save_agriculture_type(
        &self,
        input: AgricultureTypeStep,
    ) -> Result<StepOutcome, RegistrationError> {
        let value = non_empty(input.farmer_type.as_deref())
            .ok_or_else(|| validation("Agriculture type is required"))?;
        self.save(input.session_id.as_deref(), DraftUpdate::FarmerType(value))
            .await
    }

    /// Step 4: economic scale.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::Validation` if the scale is missing.
    pub async fn save_economic_scale(
        &self,
        input: EconomicScaleStep,
    ) -> Result<StepOutcome, RegistrationError> {
        let value = non_empty(input.economic_scale.as_deref())
            .ok_or_else(|| validation("Economic scale is required"))?;
        self.save(input.session_id.as_deref(), DraftUpdate::EconomicScale(value))
            .await
    }

    /// Step 5: login email.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::Validation` if the email is missing or
    /// malformed, `RegistrationError::EmailAlreadyRegistered` if a farmer
    /// already uses it. The draft is untouched in both cases.
    pub async fn save_email(&self, input: EmailStep) -> Result<StepOutcome, RegistrationError> {
        let raw =
            non_empty(input.email.as_deref()).ok_or_else(|| validation("Email is required"))?;
        let email = Email::parse(&raw).map_err(AuthError::from)?;

        if self.farmers.email_exists(&email).await? {
            tracing::info!("Step 5 rejected: email already registered");
            return Err(RegistrationError::EmailAlreadyRegistered);
        }

        self.save(input.session_id.as_deref(), DraftUpdate::Email(email))
            .await
    }

    /// Look up the draft for a session.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::SessionNotFound` if the session id is
    /// malformed, unknown, or expired.
    pub async fn progress(&self, session_id: &str) -> Result<RegistrationDraft, RegistrationError> {
        let session_id =
            SessionId::parse(session_id).map_err(|_| RegistrationError::SessionNotFound)?;
        self.drafts
            .find_by_session(&session_id)
            .await?
            .ok_or(RegistrationError::SessionNotFound)
    }

    /// Step 6: create the farmer.
    ///
    /// The farmer store's unique email constraint is the final guard; the
    /// pre-check only gives the common case a cheap early answer.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::Validation` naming the first incomplete
    /// group, `RegistrationError::SessionNotFound` if the draft is gone,
    /// `RegistrationError::EmailAlreadyRegistered` if the email is taken.
    pub async fn complete(&self, input: CompleteRegistration) -> Result<Completion, RegistrationError> {
        let preferred_language = input.preferred_language.unwrap_or_default();

        let (candidate, session_id) = if input.has_inline_profile() {
            let session_id = input
                .session_id
                .as_deref()
                .and_then(|s| SessionId::parse(s).ok());
            (Candidate::from_inline(input), session_id)
        } else {
            let Some(raw) = input.session_id.as_deref() else {
                return Err(validation("Session ID or registration data is required"));
            };
            let session_id =
                SessionId::parse(raw).map_err(|_| RegistrationError::SessionNotFound)?;
            let draft = self
                .drafts
                .find_by_session(&session_id)
                .await?
                .ok_or(RegistrationError::SessionNotFound)?;
            (Candidate::from_draft(draft, input.password), Some(session_id))
        };

        let new_farmer = candidate.validate(preferred_language)?;

        if self.farmers.email_exists(&new_farmer.email).await? {
            return Err(RegistrationError::EmailAlreadyRegistered);
        }

        let farmer = self.farmers.create(new_farmer).await.inspect_err(|e| {
            if matches!(e, RepositoryError::Conflict(_)) {
                tracing::info!("Completion lost email uniqueness race");
            }
        })?;

        tracing::info!(
            farmer_id = %farmer.id,
            session_id = session_id.as_ref().map(SessionId::as_str),
            "Registration complete"
        );

        if let Some(session_id) = &session_id
            && let Err(e) = self.drafts.delete_by_session(session_id).await
        {
            tracing::warn!(
                session_id = %session_id,
                error = %e,
                "Failed to delete completed draft; expiry will reclaim it"
            );
        }

        let token = self.jwt.issue(farmer.id, &farmer.email)?;

        let account = AccountService::new(self.farmers, self.jwt, self.email);
        if let Err(e) = account.request_email_verification(farmer.id).await {
            tracing::warn!(farmer_id = %farmer.id, error = %e, "Could not start email verification");
        }

        Ok(Completion {
            farmer,
            token,
            session_id,
        })
    }

    async fn save(
        &self,
        session_id: Option<&str>,
        update: DraftUpdate,
    ) -> Result<StepOutcome, RegistrationError> {
        let session_id = match session_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => SessionId::parse(raw).map_err(|e| validation(&e.to_string()))?,
            None => SessionId::generate(),
        };
        let step = update.step();
        let draft = self.drafts.upsert(&session_id, update).await?;

        tracing::info!(
            session_id = %session_id,
            step = step.number(),
            current_step = draft.current_step.number(),
            "Registration step saved"
        );
        Ok(StepOutcome { step, draft })
    }
}

/// Profile groups gathered from a draft or an inline request, not yet checked.
struct Candidate {
    personal_info: Option<PersonalInfo>,
    location_info: Option<LocationInfo>,
    farm_info: Option<FarmProfile>,
    email: Option<String>,
    password: Option<String>,
}

impl Candidate {
    fn from_draft(draft: RegistrationDraft, password: Option<String>) -> Self {
        Self {
            personal_info: draft.personal_info,
            location_info: draft.location_info,
            farm_info: draft
                .farm_info
                .complete()
                .map(|(farmer_type, economic_scale)| FarmProfile {
                    farmer_type,
                    economic_scale,
                }),
            email: draft.login_credentials.map(|c| c.email.into_inner()),
            password,
        }
    }

    fn from_inline(input: CompleteRegistration) -> Self {
        let personal_info = input.personal_info.and_then(|p| {
            Some(PersonalInfo {
                first_name: non_empty(p.first_name.as_deref())?,
                middle_name: non_empty(p.middle_name.as_deref()),
                last_name: non_empty(p.last_name.as_deref())?,
            })
        });
        let location_info = input.location_info.and_then(|l| {
            location(
                l.province.as_deref(),
                l.district.as_deref(),
                l.municipality.as_deref(),
            )
        });
        let farm_info = input.farm_info.and_then(|f| {
            Some(FarmProfile {
                farmer_type: non_empty(f.farmer_type.as_deref())?,
                economic_scale: non_empty(f.economic_scale.as_deref())?,
            })
        });
        let credentials = input.login_credentials.unwrap_or_default();

        Self {
            personal_info,
            location_info,
            farm_info,
            email: credentials.email,
            password: credentials.password.or(input.password),
        }
    }

    /// Check groups in order; the first missing one names the error.
    fn validate(self, preferred_language: PreferredLanguage) -> Result<NewFarmer, RegistrationError> {
        let personal_info = self
            .personal_info
            .ok_or_else(|| validation("Personal information is incomplete"))?;
        let location_info = self
            .location_info
            .ok_or_else(|| validation("Location information is incomplete"))?;
        let farm_info = self
            .farm_info
            .ok_or_else(|| validation("Farm information is incomplete"))?;
        let (Some(email), Some(password)) = (
            non_empty(self.email.as_deref()),
            self.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(validation("Login credentials are incomplete"));
        };

        let email = Email::parse(&email).map_err(AuthError::from)?;
        let password_hash = PasswordHash::hash(&password)?;

        Ok(NewFarmer {
            personal_info,
            location_info,
            farm_info,
            email,
            password_hash,
            preferred_language,
        })
    }
}

fn validation(message: &str) -> RegistrationError {
    RegistrationError::Validation(message.to_owned())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn location(
    province: Option<&str>,
    district: Option<&str>,
    municipality: Option<&str>,
) -> Option<LocationInfo> {
    Some(LocationInfo {
        province: non_empty(province)?,
        district: non_empty(district)?,
        municipality: non_empty(municipality)?,
    })
}
