//! Login, email verification and password reset routes.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::cache::keys::user_profile_key;
use crate::error::{JsonBody, Result};
use crate::middleware::RequireAuth;
use crate::models::FarmerProfile;
use crate::state::AppState;

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    success: bool,
    token: String,
    user: FarmerProfile,
}

/// A one-time token from an emailed link.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

/// Forgot-password form data.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Reset-password form data.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Acknowledgement with a human-readable message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    success: bool,
    message: &'static str,
}

impl MessageResponse {
    const fn ok(message: &'static str) -> Json<Self> {
        Json(Self {
            success: true,
            message,
        })
    }
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (token, farmer) = state.accounts().login(&form.email, &form.password).await?;
    Ok(Json(LoginResponse {
        success: true,
        token,
        user: FarmerProfile::from(&farmer),
    }))
}

/// POST /auth/verify-email/request
pub async fn request_verification(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
) -> Result<Json<MessageResponse>> {
    state.accounts().request_email_verification(claims.sub).await?;
    Ok(MessageResponse::ok("Verification email sent"))
}

/// POST /auth/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<TokenRequest>,
) -> Result<Json<MessageResponse>> {
    let farmer_id = state.accounts().verify_email(&form.token).await?;
    // The cached profile carries the verification flag
    state.cache().delete(&user_profile_key(&farmer_id)).await;
    Ok(MessageResponse::ok("Email verified"))
}

/// POST /auth/forgot-password
///
/// Answers the same whether or not the account exists.
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    state.accounts().forgot_password(&form.email).await?;
    Ok(MessageResponse::ok(
        "If an account exists for this email, a reset link has been sent",
    ))
}

/// POST /auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    state
        .accounts()
        .reset_password(&form.token, &form.password)
        .await?;
    Ok(MessageResponse::ok("Password has been reset"))
}
