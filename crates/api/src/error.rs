//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Error responses share one JSON
//! shape carrying a stable code, a client-safe message and the request's
//! correlation id:
//!
//! ```json
//! {"success": false, "error": {"code": "VALIDATION_ERROR", "message": "...", "correlationId": "..."}}
//! ```

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::ai::AiError;
use crate::db::RepositoryError;
use crate::middleware::request_id::current_request_id;
use crate::services::{AuthError, RegistrationError};

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// The email belongs to an existing farmer.
    #[error("Email already registered")]
    EmailAlreadyRegistered,

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Missing or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// AI or plant recognition provider failed after retries.
    #[error("Upstream error: {0}")]
    Upstream(#[from] AiError),

    /// Cache backend not connected.
    #[error("Cache unavailable")]
    CacheUnavailable,

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::EmailAlreadyRegistered => "EMAIL_ALREADY_REGISTERED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::RateLimited => "RATE_LIMITED",
            Self::Upstream(_) => "UPSTREAM_UNAVAILABLE",
            Self::CacheUnavailable => "CACHE_UNAVAILABLE",
            Self::Database(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::EmailAlreadyRegistered => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::CacheUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client.
    fn public_message(&self) -> String {
        // Don't expose internal or provider error details to clients
        match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_owned(),
            Self::Upstream(AiError::RateLimited { .. }) => {
                "Rate limit exceeded. Please try again later.".to_owned()
            }
            Self::Upstream(AiError::Status { status: 402, .. }) => {
                "Service quota exceeded. Please try again later.".to_owned()
            }
            Self::Upstream(_) => "Service unavailable, please try again".to_owned(),
            Self::RateLimited => "Too many requests, please slow down".to_owned(),
            _ => self.to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorBody,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let correlation_id = current_request_id();

        // Capture server errors to Sentry
        if self.status().is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                code = self.code(),
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, code = self.code(), "Request rejected");
        }

        let body = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code: self.code(),
                message: self.public_message(),
                correlation_id,
            },
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<RegistrationError> for AppError {
    fn from(e: RegistrationError) -> Self {
        match e {
            RegistrationError::Validation(msg) => Self::Validation(msg),
            RegistrationError::EmailAlreadyRegistered => Self::EmailAlreadyRegistered,
            RegistrationError::SessionNotFound => Self::NotFound(e.to_string()),
            RegistrationError::Auth(inner) => inner.into(),
            RegistrationError::Repository(inner) => Self::Database(inner),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => Self::Unauthorized("Invalid email or password".into()),
            AuthError::InvalidToken => Self::Unauthorized("Invalid or expired token".into()),
            AuthError::InvalidOneTimeToken => {
                Self::Validation("Invalid or expired token".to_owned())
            }
            AuthError::WeakPassword(msg) => Self::Validation(msg),
            AuthError::InvalidEmail(_) => Self::Validation("Invalid email address".to_owned()),
            AuthError::Repository(inner) => Self::Database(inner),
            AuthError::PasswordHash | AuthError::TokenSigning(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(rejection = %rejection.body_text(), "Rejected request body");
        Self::Validation("Request body must be valid JSON".to_owned())
    }
}

/// JSON request body whose rejections use the shared error shape.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a farmer ID.
///
/// Call this after successful authentication to associate errors with farmers.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}
