//! HS256 bearer tokens.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use agrisathi_core::{Email, FarmerId};

use super::AuthError;

/// Claims carried by an auth token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Farmer id.
    pub sub: FarmerId,
    /// Farmer email at issue time.
    pub email: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expires at (unix seconds).
    pub exp: i64,
}

/// Issues and verifies auth tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("algorithm", &"HS256")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    /// Build from a shared secret; tokens live for `ttl`.
    #[must_use]
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let key = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            ttl,
        }
    }

    /// Issue a token for a farmer.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenSigning` if encoding fails.
    pub fn issue(&self, farmer_id: FarmerId, email: &Email) -> Result<String, AuthError> {
        let iat = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: farmer_id,
            email: email.as_str().to_owned(),
            iat,
            exp: iat.saturating_add(ttl),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenSigning(e.to_string()))
    }

    /// Verify signature and expiry, returning the claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for any malformed, tampered, or
    /// expired token.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected auth token");
                AuthError::InvalidToken
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service(ttl: Duration) -> JwtService {
        JwtService::new(
            &SecretString::from("k3J9$mQ2!vX7#pL4@wR8&zT1*nB6^cY5"),
            ttl,
        )
    }

    #[test]
    fn test_issue_and_verify() {
        let jwt = service(Duration::from_secs(3600));
        let id = FarmerId::generate();
        let email = Email::parse("sita@example.com").unwrap();

        let token = jwt.issue(id, &email).unwrap();
        let claims = jwt.verify(&token).unwrap();

        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "sita@example.com");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_rejects_other_secret() {
        let token = service(Duration::from_secs(60))
            .issue(FarmerId::generate(), &Email::parse("a@b.c").unwrap())
            .unwrap();
        let other = JwtService::new(
            &SecretString::from("Zq8#Lm3!Vt6@Rp1$Wx4&Ny7*Kb2^Hd9%"),
            Duration::from_secs(60),
        );
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_rejects_expired() {
        let jwt = service(Duration::ZERO);
        let token = jwt
            .issue(FarmerId::generate(), &Email::parse("a@b.c").unwrap())
            .unwrap();
        std::thread::sleep(Duration::from_millis(1100));
        assert!(matches!(jwt.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_rejects_garbage() {
        let jwt = service(Duration::from_secs(60));
        assert!(jwt.verify("not.a.token").is_err());
    }
}
