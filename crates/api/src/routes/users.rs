//! Current farmer's profile.

use axum::{Json, extract::State};
use serde::Serialize;

use agrisathi_core::FarmerId;

use crate::cache::Cached;
use crate::cache::keys::{user_profile_key, weekly_tips_pattern};
use crate::db::RepositoryError;
use crate::error::{AppError, JsonBody, Result};
use crate::middleware::RequireAuth;
use crate::models::{FarmerProfile, ProfileUpdate};
use crate::state::AppState;

/// A farmer profile plus whether it came from the cache.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    success: bool,
    user: FarmerProfile,
    cached: bool,
}

/// GET /users/me
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
) -> Result<Json<ProfileResponse>> {
    let profile = load_profile(&state, claims.sub).await?;

    Ok(Json(ProfileResponse {
        success: true,
        user: profile.value,
        cached: profile.cached,
    }))
}

/// PATCH /users/me
///
/// Invalidates the cached profile and every cached weekly tip of the farmer,
/// since tips are tailored to the profile.
pub async fn update_me(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    validate_update(&update)?;

    let farmer = state
        .farmers()
        .update_profile(claims.sub, &update)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("User not found".to_owned()),
            other => other.into(),
        })?;

    let cache = state.cache();
    cache.delete(&user_profile_key(&farmer.id)).await;
    let dropped = cache.delete_pattern(&weekly_tips_pattern(&farmer.id)).await;
    tracing::info!(farmer_id = %farmer.id, dropped_tips = dropped, "Profile updated");

    Ok(Json(ProfileResponse {
        success: true,
        user: FarmerProfile::from(&farmer),
        cached: false,
    }))
}

/// A farmer's public profile, served cache-aside.
pub(crate) async fn load_profile(state: &AppState, id: FarmerId) -> Result<Cached<FarmerProfile>> {
    let key = user_profile_key(&id);
    let ttl = state.config().cache.ttls.user_profile;
    state
        .cache()
        .get_or_compute(&key, ttl, || async {
            state
                .farmers()
                .find_by_id(id)
                .await?
                .map(|farmer| FarmerProfile::from(&farmer))
                .ok_or_else(|| AppError::NotFound("User not found".to_owned()))
        })
        .await
}

fn validate_update(update: &ProfileUpdate) -> Result<()> {
    if update.is_empty() {
        return Err(AppError::Validation("No profile fields to update".to_owned()));
    }

    let blank = |s: &str| s.trim().is_empty();
    if let Some(info) = &update.personal_info
        && (blank(&info.first_name) || blank(&info.last_name))
    {
        return Err(AppError::Validation(
            "First name and last name are required".to_owned(),
        ));
    }
    if let Some(info) = &update.location_info
        && [&info.province, &info.district, &info.municipality]
            .iter()
            .any(|s| blank(s))
    {
        return Err(AppError::Validation(
            "Province, district, and municipality are required".to_owned(),
        ));
    }
    if let Some(info) = &update.farm_info
        && (blank(&info.farmer_type) || blank(&info.economic_scale))
    {
        return Err(AppError::Validation(
            "Agriculture type and economic scale are required".to_owned(),
        ));
    }
    Ok(())
}
