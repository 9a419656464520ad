//! Argon2id password hashing.

use argon2::{
    Argon2,
    password_hash::{self, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use super::AuthError;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum password length, bounding hashing cost.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// An Argon2id PHC hash string.
///
/// Only obtainable by hashing a password or by loading a stored hash, so a
/// plaintext password can never end up where a hash is expected.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Validate and hash a plaintext password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the password is too short or too
    /// long, `AuthError::PasswordHash` if hashing fails.
    pub fn hash(password: &str) -> Result<Self, AuthError> {
        validate_password(password)?;

        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| Self(hash.to_string()))
            .map_err(|_| AuthError::PasswordHash)
    }

    /// Wrap a hash read back from storage.
    #[must_use]
    pub const fn from_stored(hash: String) -> Self {
        Self(hash)
    }

    /// Check a plaintext password against this hash.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` on mismatch or if the stored
    /// hash cannot be parsed.
    pub fn verify(&self, password: &str) -> Result<(), AuthError> {
        let parsed =
            password_hash::PasswordHash::new(&self.0).map_err(|_| AuthError::InvalidCredentials)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AuthError::InvalidCredentials)
    }

    /// The PHC string, for storage.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordHash([REDACTED])")
    }
}

/// Validate password strength.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is outside the allowed
/// length range.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_not_plaintext_and_verifies() {
        let hash = PasswordHash::hash("Secret123").unwrap();
        assert_ne!(hash.as_str(), "Secret123");
        assert!(hash.as_str().starts_with("$argon2id$"));
        assert!(hash.verify("Secret123").is_ok());
        assert!(matches!(
            hash.verify("secret123"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_same_password_different_salts() {
        let a = PasswordHash::hash("Secret123").unwrap();
        let b = PasswordHash::hash("Secret123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_short_password() {
        assert!(matches!(
            PasswordHash::hash("12345"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn test_debug_is_redacted() {
        let hash = PasswordHash::hash("Secret123").unwrap();
        assert_eq!(format!("{hash:?}"), "PasswordHash([REDACTED])");
    }

    #[test]
    fn test_corrupt_stored_hash_fails_closed() {
        let hash = PasswordHash::from_stored("not-a-phc-string".into());
        assert!(matches!(
            hash.verify("anything"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
