//! Authentication and account service.
//!
//! Password login, email verification and password reset. Registration
//! itself lives in [`crate::services::registration`].

mod error;
mod jwt;
mod password;
mod tokens;

pub use error::AuthError;
pub use jwt::{Claims, JwtService};
pub use password::{MIN_PASSWORD_LENGTH, PasswordHash, validate_password};
pub use tokens::{generate_token, hash_token};

use chrono::{TimeDelta, Utc};

use agrisathi_core::{Email, FarmerId};

use crate::db::FarmerStore;
use crate::models::Farmer;
use crate::services::email::EmailService;

/// Lifetime of an email verification token, in hours.
pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;

/// Lifetime of a password reset token, in hours.
pub const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// Account service.
///
/// Borrows the stores it needs from application state for one request.
pub struct AccountService<'a> {
    farmers: &'a FarmerStore,
    jwt: &'a JwtService,
    email: &'a EmailService,
}

impl<'a> AccountService<'a> {
    /// Create a new account service.
    #[must_use]
    pub const fn new(farmers: &'a FarmerStore, jwt: &'a JwtService, email: &'a EmailService) -> Self {
        Self {
            farmers,
            jwt,
            email,
        }
    }

    /// Login with email and password, returning a fresh token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<(String, Farmer), AuthError> {
        // Unparseable emails are indistinguishable from unknown ones
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let farmer = self
            .farmers
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        farmer.password_hash.verify(password)?;

        let token = self.jwt.issue(farmer.id, &farmer.email)?;
        tracing::info!(farmer_id = %farmer.id, "Farmer logged in");
        Ok((token, farmer))
    }

    /// Issue a verification token for a farmer and email them the link.
    ///
    /// Already-verified farmers get no email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the farmer no longer exists.
    pub async fn request_email_verification(&self, farmer_id: FarmerId) -> Result<(), AuthError> {
        let farmer = self
            .farmers
            .find_by_id(farmer_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if farmer.email_verification.is_verified {
            tracing::debug!(farmer_id = %farmer.id, "Email already verified");
            return Ok(());
        }

        let token = generate_token();
        self.farmers
            .set_verification_token(
                farmer.id,
                &hash_token(&token),
                Utc::now() + TimeDelta::hours(VERIFICATION_TOKEN_TTL_HOURS),
            )
            .await?;

        if let Err(e) = self
            .email
            .send_verification(&farmer.email, &farmer.personal_info.first_name, &token)
            .await
        {
            tracing::error!(farmer_id = %farmer.id, error = %e, "Verification email failed");
        }
        Ok(())
    }

    /// Consume a verification token and send the welcome email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidOneTimeToken` if the token is unknown, used,
    /// or expired.
    pub async fn verify_email(&self, token: &str) -> Result<FarmerId, AuthError> {
        let farmer_id = self
            .farmers
            .verify_email(&hash_token(token))
            .await?
            .ok_or(AuthError::InvalidOneTimeToken)?;

        tracing::info!(farmer_id = %farmer_id, "Email verified");

        if let Some(farmer) = self.farmers.find_by_id(farmer_id).await?
            && let Err(e) = self
                .email
                .send_welcome(&farmer.email, &farmer.personal_info.first_name)
                .await
        {
            tracing::error!(farmer_id = %farmer_id, error = %e, "Welcome email failed");
        }
        Ok(farmer_id)
    }

    /// Start a password reset.
    ///
    /// Succeeds whether or not the email belongs to an account, so the
    /// response cannot reveal which addresses are registered.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the store fails.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let Ok(email) = Email::parse(email) else {
            return Ok(());
        };
        let Some(farmer) = self.farmers.find_by_email(&email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = generate_token();
        self.farmers
            .set_reset_token(
                farmer.id,
                &hash_token(&token),
                Utc::now() + TimeDelta::hours(RESET_TOKEN_TTL_HOURS),
            )
            .await?;

        if let Err(e) = self
            .email
            .send_password_reset(&farmer.email, &farmer.personal_info.first_name, &token)
            .await
        {
            tracing::error!(farmer_id = %farmer.id, error = %e, "Password reset email failed");
        }
        Ok(())
    }

    /// Complete a password reset.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the new password is invalid,
    /// `AuthError::InvalidOneTimeToken` if the token is unknown, used, or
    /// expired.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<FarmerId, AuthError> {
        let password_hash = PasswordHash::hash(password)?;

        let farmer_id = self
            .farmers
            .reset_password(&hash_token(token), &password_hash)
            .await?
            .ok_or(AuthError::InvalidOneTimeToken)?;

        tracing::info!(farmer_id = %farmer_id, "Password reset");
        Ok(farmer_id)
    }
}
