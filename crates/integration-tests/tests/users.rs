//! Integration tests for the current farmer's profile.

use axum::http::StatusCode;
use serde_json::json;

use agrisathi_integration_tests::TestApp;

#[tokio::test]
async fn test_profile_is_cached() {
    let app = TestApp::new();
    let (token, user) = app.register("profile@example.com").await;

    let first = app.get_auth("/users/me", &token).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["cached"], false);
    assert_eq!(first.body["user"], user);

    let second = app.get_auth("/users/me", &token).await;
    assert_eq!(second.body["cached"], true);
    assert_eq!(second.body["user"], first.body["user"]);
}

#[tokio::test]
async fn test_update_invalidates_cached_profile() {
    let app = TestApp::new();
    let (token, _) = app.register("update@example.com").await;
    app.get_auth("/users/me", &token).await;

    let updated = app
        .patch_auth(
            "/users/me",
            &json!({
                "locationInfo": {"province": "Karnali", "district": "Surkhet", "municipality": "Birendranagar"},
                "preferredLanguage": "ne"
            }),
            &token,
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["user"]["locationInfo"]["district"], "Surkhet");
    assert_eq!(updated.body["user"]["preferredLanguage"], "ne");
    // Untouched groups survive
    assert_eq!(updated.body["user"]["personalInfo"]["firstName"], "Ram");

    let fresh = app.get_auth("/users/me", &token).await;
    assert_eq!(fresh.body["cached"], false);
    assert_eq!(fresh.body["user"]["locationInfo"]["province"], "Karnali");
}

#[tokio::test]
async fn test_update_rejects_bad_input() {
    let app = TestApp::new();
    let (token, _) = app.register("bad-update@example.com").await;

    let empty = app.patch_auth("/users/me", &json!({}), &token).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.error_message(), Some("No profile fields to update"));

    let blank = app
        .patch_auth(
            "/users/me",
            &json!({"personalInfo": {"firstName": " ", "lastName": "Thapa"}}),
            &token,
        )
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    // Email and password are not editable here
    let email = app
        .patch_auth("/users/me", &json!({"email": "new@example.com"}), &token)
        .await;
    assert_eq!(email.status, StatusCode::BAD_REQUEST);
    assert_eq!(email.error_code(), Some("VALIDATION_ERROR"));
}

#[tokio::test]
async fn test_profile_requires_auth() {
    let app = TestApp::new();
    let response = app
        .request(
            axum::http::Method::PATCH,
            "/users/me",
            Some(&json!({"preferredLanguage": "ne"})),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}
