//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness
//! GET    /health/ready                    - Readiness (store + cache)
//!
//! # Registration (rate limited)
//! POST   /registration/step1..step5       - Save one step into the draft
//! POST   /registration/complete           - Create the farmer (201)
//! GET    /registration/progress/{id}      - Draft lookup
//! GET    /registration/options            - Static option lists (cached)
//!
//! # Auth (rate limited)
//! POST   /auth/login                      - Email + password login
//! POST   /auth/verify-email/request       - Email a verification link (auth)
//! POST   /auth/verify-email               - Consume a verification token
//! POST   /auth/forgot-password            - Email a reset link
//! POST   /auth/reset-password             - Consume a reset token
//!
//! # Users (auth)
//! GET    /users/me                        - Own profile (cached)
//! PATCH  /users/me                        - Edit own profile
//!
//! # AI
//! POST   /ai/ask                          - Question (optional auth)
//! GET    /ai/weekly-tips                  - Tips for this ISO week (auth)
//! POST   /ai/diagnose                     - Crop problem diagnosis
//! POST   /ai/identify-plant               - Plant photo identification
//! POST   /ai/tts                          - Read text aloud (base64 audio)
//!
//! # Cache (auth)
//! GET    /cache/stats                     - Backend statistics
//! DELETE /cache/clear                     - Drop every key
//! DELETE /cache/clear/{pattern}           - Drop keys matching a glob
//! ```

pub mod ai;
pub mod auth;
pub mod cache;
pub mod health;
pub mod registration;
pub mod users;

use std::time::Duration;

use axum::{
    Router,
    http::{HeaderName, Method, Request, Response, header},
    middleware::{from_fn, map_response},
    routing::{delete, get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, OnResponse, TraceLayer},
};
use tracing::Span;

use crate::middleware::{
    REQUEST_ID_HEADER, auth_rate_limiter, rate_limit_response, registration_rate_limiter,
    request_id_middleware,
};
use crate::state::AppState;

/// Create the registration routes router.
pub fn registration_routes() -> Router<AppState> {
    Router::new()
        .route("/step1", post(registration::step1))
        .route("/step2", post(registration::step2))
        .route("/step3", post(registration::step3))
        .route("/step4", post(registration::step4))
        .route("/step5", post(registration::step5))
        .route("/complete", post(registration::complete))
        .route("/progress/{session_id}", get(registration::progress))
        .route("/options", get(registration::options))
        .layer(registration_rate_limiter())
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/verify-email/request", post(auth::request_verification))
        .route("/verify-email", post(auth::verify_email))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .layer(auth_rate_limiter())
}

/// Create the user routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new().route("/me", get(users::me).patch(users::update_me))
}

/// Create the AI routes router.
pub fn ai_routes() -> Router<AppState> {
    Router::new()
        .route("/ask", post(ai::ask))
        .route("/weekly-tips", get(ai::weekly_tips))
        .route("/diagnose", post(ai::diagnose))
        .route("/identify-plant", post(ai::identify_plant))
        .route("/tts", post(ai::tts))
}

/// Create the cache administration router.
pub fn cache_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(cache::stats))
        .route("/clear", delete(cache::clear_all))
        .route("/clear/{pattern}", delete(cache::clear_pattern))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/registration", registration_routes())
        .nest("/auth", auth_routes())
        .nest("/users", user_routes())
        .nest("/ai", ai_routes())
        .nest("/cache", cache_routes())
}

/// The complete application: routes, middleware and state.
///
/// Sentry layers are added by the binary, which owns the Sentry client.
pub fn app(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, request_id.clone()])
        .expose_headers([request_id])
        .max_age(Duration::from_secs(3600));

    routes()
        .layer(map_response(rate_limit_response))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    span.record(
                        "latency_ms",
                        u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                    );
                    DefaultOnResponse::default().on_response(response, latency, span);
                }),
        )
        .with_state(state)
}
