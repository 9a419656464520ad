//! Integration tests for login, email verification and password reset.
//!
//! The auth routes allow a burst of five requests per client, so each test
//! stays within that budget except the one that checks the limit itself.

use axum::http::StatusCode;
use chrono::{TimeDelta, Utc};
use serde_json::json;

use agrisathi_api::services::auth::hash_token;
use agrisathi_core::{Email, FarmerId};
use agrisathi_integration_tests::{TEST_PASSWORD, TestApp};

async fn farmer_id(app: &TestApp, email: &str) -> FarmerId {
    let email = Email::parse(email).unwrap();
    app.state()
        .farmers()
        .find_by_email(&email)
        .await
        .unwrap()
        .expect("farmer stored")
        .id
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login() {
    let app = TestApp::new();
    let (_, user) = app.register("login@example.com").await;

    let ok = app
        .post(
            "/auth/login",
            &json!({"email": "LOGIN@example.com", "password": TEST_PASSWORD}),
        )
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["user"]["id"], user["id"]);
    let token = ok.body["token"].as_str().unwrap();

    let me = app.get_auth("/users/me", token).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["user"]["email"], "login@example.com");

    let wrong = app
        .post(
            "/auth/login",
            &json!({"email": "login@example.com", "password": "Wrong456"}),
        )
        .await;
    let unknown = app
        .post(
            "/auth/login",
            &json!({"email": "nobody@example.com", "password": TEST_PASSWORD}),
        )
        .await;

    // Unknown accounts and wrong passwords are indistinguishable
    for response in [&wrong, &unknown] {
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.error_code(), Some("UNAUTHORIZED"));
        assert_eq!(response.error_message(), Some("Invalid email or password"));
    }
}

#[tokio::test]
async fn test_invalid_bearer_token_rejected() {
    let app = TestApp::new();

    let missing = app.get("/users/me").await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.error_message(), Some("Authentication required"));

    let forged = app.get_auth("/users/me", "not.a.jwt").await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_routes_are_rate_limited() {
    let app = TestApp::new();
    let body = json!({"email": "flood@example.com", "password": "whatever1"});

    let mut last = None;
    for _ in 0..6 {
        last = Some(app.post("/auth/login", &body).await);
    }
    let last = last.unwrap();

    assert_eq!(last.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(last.error_code(), Some("RATE_LIMITED"));
    assert_eq!(last.body["success"], false);
}

// ============================================================================
// Email verification
// ============================================================================

#[tokio::test]
async fn test_email_verification() {
    let app = TestApp::new();
    let (token, user) = app.register("verify@example.com").await;
    assert_eq!(user["emailVerified"], false);

    let unauthenticated = app
        .post("/auth/verify-email/request", &json!({}))
        .await;
    assert_eq!(unauthenticated.status, StatusCode::UNAUTHORIZED);

    // Prime the profile cache so verification has to invalidate it
    let before = app.get_auth("/users/me", &token).await;
    assert_eq!(before.body["user"]["emailVerified"], false);

    let id = farmer_id(&app, "verify@example.com").await;
    let expires = Utc::now() + TimeDelta::hours(1);
    app.state()
        .farmers()
        .set_verification_token(id, &hash_token("known-verification-token"), expires)
        .await
        .unwrap();

    let bogus = app
        .post("/auth/verify-email", &json!({"token": "bogus"}))
        .await;
    assert_eq!(bogus.status, StatusCode::BAD_REQUEST);
    assert_eq!(bogus.error_message(), Some("Invalid or expired token"));

    let verified = app
        .post(
            "/auth/verify-email",
            &json!({"token": "known-verification-token"}),
        )
        .await;
    assert_eq!(verified.status, StatusCode::OK);
    assert_eq!(verified.body["message"], "Email verified");

    let after = app.get_auth("/users/me", &token).await;
    assert_eq!(after.body["user"]["emailVerified"], true);

    // Tokens are single use
    let reused = app
        .post(
            "/auth/verify-email",
            &json!({"token": "known-verification-token"}),
        )
        .await;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Password reset
// ============================================================================

#[tokio::test]
async fn test_password_reset() {
    let app = TestApp::new();
    app.register("reset@example.com").await;

    let known = app
        .post("/auth/forgot-password", &json!({"email": "reset@example.com"}))
        .await;
    let unknown = app
        .post(
            "/auth/forgot-password",
            &json!({"email": "ghost@example.com"}),
        )
        .await;
    assert_eq!(known.status, StatusCode::OK);
    assert_eq!(known.body, unknown.body);

    // Replace the mailed token with one the test knows
    let id = farmer_id(&app, "reset@example.com").await;
    let expires = Utc::now() + TimeDelta::hours(1);
    app.state()
        .farmers()
        .set_reset_token(id, &hash_token("known-reset-token"), expires)
        .await
        .unwrap();

    let reset = app
        .post(
            "/auth/reset-password",
            &json!({"token": "known-reset-token", "password": "NewSecret456"}),
        )
        .await;
    assert_eq!(reset.status, StatusCode::OK);
    assert_eq!(reset.body["message"], "Password has been reset");

    let old = app
        .post(
            "/auth/login",
            &json!({"email": "reset@example.com", "password": TEST_PASSWORD}),
        )
        .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);

    let new = app
        .post(
            "/auth/login",
            &json!({"email": "reset@example.com", "password": "NewSecret456"}),
        )
        .await;
    assert_eq!(new.status, StatusCode::OK);
}

#[tokio::test]
async fn test_expired_reset_token_rejected() {
    let app = TestApp::new();
    app.register("expired@example.com").await;

    let id = farmer_id(&app, "expired@example.com").await;
    let expired = Utc::now() - TimeDelta::minutes(1);
    app.state()
        .farmers()
        .set_reset_token(id, &hash_token("stale-token"), expired)
        .await
        .unwrap();

    let response = app
        .post(
            "/auth/reset-password",
            &json!({"token": "stale-token", "password": "NewSecret456"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), Some("VALIDATION_ERROR"));
}
