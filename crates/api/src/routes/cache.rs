//! Cache introspection and administration.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    success: bool,
    stats: CacheStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    success: bool,
    pattern: String,
    deleted_count: u64,
}

/// GET /cache/stats
pub async fn stats(
    State(state): State<AppState>,
    RequireAuth(_): RequireAuth,
) -> Result<Json<StatsResponse>> {
    let stats = state.cache().stats().await;
    if !stats.connected {
        return Err(AppError::CacheUnavailable);
    }
    Ok(Json(StatsResponse {
        success: true,
        stats,
    }))
}

/// DELETE /cache/clear
///
/// An admin operation with no role check: farmers have no roles, so any
/// authenticated farmer may flush every namespace. Each call is logged with
/// the caller's id.
pub async fn clear_all(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
) -> Result<Json<ClearResponse>> {
    clear(&state, "*", &claims.sub.to_string()).await
}

/// DELETE /cache/clear/{pattern}
///
/// Same access rule as [`clear_all`].
pub async fn clear_pattern(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
    Path(pattern): Path<String>,
) -> Result<Json<ClearResponse>> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(AppError::Validation("Pattern is required".to_owned()));
    }
    clear(&state, pattern, &claims.sub.to_string()).await
}

async fn clear(state: &AppState, pattern: &str, requested_by: &str) -> Result<Json<ClearResponse>> {
    let cache = state.cache();
    if !cache.is_connected().await {
        return Err(AppError::CacheUnavailable);
    }

    let deleted_count = cache.delete_pattern(pattern).await;
    tracing::info!(pattern, deleted_count, requested_by, "Cache cleared");

    Ok(Json(ClearResponse {
        success: true,
        pattern: pattern.to_owned(),
        deleted_count,
    }))
}
