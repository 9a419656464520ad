//! Multi-step registration routes.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use serde_json::Value;

use agrisathi_core::SessionId;

use crate::cache::keys::registration_options_key;
use crate::error::{AppError, JsonBody, Result};
use crate::models::{FarmerProfile, RegistrationDraft, RegistrationStep};
use crate::services::options::registration_options;
use crate::services::registration::{
    AgricultureTypeStep, CompleteRegistration, EconomicScaleStep, EmailStep, LocationStep,
    NameStep, StepOutcome,
};
use crate::state::AppState;

/// Response for steps 1-5.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResponse {
    success: bool,
    message: &'static str,
    step: RegistrationStep,
    data: RegistrationDraft,
    next_step: RegistrationStep,
    session_id: SessionId,
}

impl StepResponse {
    fn new(message: &'static str, outcome: StepOutcome) -> Json<Self> {
        Json(Self {
            success: true,
            message,
            step: outcome.step,
            next_step: outcome.step.next(),
            session_id: outcome.draft.session_id.clone(),
            data: outcome.draft,
        })
    }
}

/// Response for step 6.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    success: bool,
    message: &'static str,
    step: RegistrationStep,
    user: FarmerProfile,
    token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<SessionId>,
    registration_complete: bool,
}

/// Response for a progress lookup.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    success: bool,
    current_step: RegistrationStep,
    data: RegistrationDraft,
}

/// Response for the option lists.
#[derive(Debug, Serialize)]
pub struct OptionsResponse {
    success: bool,
    options: Value,
    cached: bool,
}

/// POST /registration/step1
pub async fn step1(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<NameStep>,
) -> Result<Json<StepResponse>> {
    let outcome = state.registration().save_name(input).await?;
    Ok(StepResponse::new("Name saved", outcome))
}

/// POST /registration/step2
pub async fn step2(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LocationStep>,
) -> Result<Json<StepResponse>> {
    let outcome = state.registration().save_location(input).await?;
    Ok(StepResponse::new("Location saved", outcome))
}

/// POST /registration/step3
pub async fn step3(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<AgricultureTypeStep>,
) -> Result<Json<StepResponse>> {
    let outcome = state.registration().save_agriculture_type(input).await?;
    Ok(StepResponse::new("Agriculture type saved", outcome))
}

/// POST /registration/step4
pub async fn step4(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<EconomicScaleStep>,
) -> Result<Json<StepResponse>> {
    let outcome = state.registration().save_economic_scale(input).await?;
    Ok(StepResponse::new("Economic scale saved", outcome))
}

/// POST /registration/step5
pub async fn step5(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<EmailStep>,
) -> Result<Json<StepResponse>> {
    let outcome = state.registration().save_email(input).await?;
    Ok(StepResponse::new("Email saved", outcome))
}

/// POST /registration/complete
///
/// Accepts `{sessionId, password}` or a fully inlined profile.
pub async fn complete(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CompleteRegistration>,
) -> Result<(StatusCode, Json<CompletionResponse>)> {
    let completion = state.registration().complete(input).await?;

    let response = CompletionResponse {
        success: true,
        message: "Registration completed successfully",
        step: RegistrationStep::Complete,
        user: FarmerProfile::from(&completion.farmer),
        token: completion.token,
        session_id: completion.session_id,
        registration_complete: true,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /registration/progress/{sessionId}
pub async fn progress(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ProgressResponse>> {
    let draft = state.registration().progress(&session_id).await?;
    Ok(Json(ProgressResponse {
        success: true,
        current_step: draft.current_step,
        data: draft,
    }))
}

/// GET /registration/options
///
/// Static lists, served cache-aside.
pub async fn options(State(state): State<AppState>) -> Result<Json<OptionsResponse>> {
    let ttl = state.config().cache.ttls.registration_options;
    let options = state
        .cache()
        .get_or_compute(registration_options_key(), ttl, || async {
            serde_json::to_value(registration_options())
        })
        .await
        .map_err(|e| AppError::Internal(format!("registration options: {e}")))?;

    Ok(Json(OptionsResponse {
        success: true,
        options: options.value,
        cached: options.cached,
    }))
}
