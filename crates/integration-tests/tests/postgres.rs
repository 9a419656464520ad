//! Registration against a real `PostgreSQL` database.
//!
//! These tests require:
//! - A running `PostgreSQL` database
//! - `DATABASE_URL` pointing at it
//!
//! Run with: cargo test -p agrisathi-integration-tests -- --ignored

use std::time::Duration;

use axum::http::StatusCode;
use secrecy::SecretString;
use serde_json::json;

use agrisathi_api::config::ApiConfig;
use agrisathi_api::cache::CacheStore;
use agrisathi_api::db::{self, DraftStore, FarmerStore};
use agrisathi_api::state::AppState;
use agrisathi_integration_tests::{TEST_JWT_SECRET, TEST_PASSWORD, TestApp};

async fn postgres_app() -> TestApp {
    let url = SecretString::from(std::env::var("DATABASE_URL").expect("DATABASE_URL set"));
    let pool = db::create_pool(&url).await.expect("database reachable");
    db::MIGRATOR.run(&pool).await.expect("migrations apply");

    let mut config = ApiConfig::development(SecretString::from(TEST_JWT_SECRET));
    config.database_url = Some(url);
    let state = AppState::connect(config).await.expect("state connects");
    TestApp::from_state(state)
}

/// A unique address so reruns do not collide with earlier farmers.
fn unique_email(tag: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{tag}-{nanos}@example.com")
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_registration_persists() {
    let app = postgres_app().await;
    let email = unique_email("pg");
    let (token, user) = app.register(&email).await;

    let me = app.get_auth("/users/me", &token).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["user"]["id"], user["id"]);

    let ready = app.get("/health/ready").await;
    assert_eq!(ready.body["database"], true);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_completions_postgres() {
    let app = postgres_app().await;
    let email = unique_email("pg-race");
    let first = app.fill_draft(&email).await;
    let second = app.fill_draft(&email).await;

    let body_a = json!({"sessionId": first, "password": TEST_PASSWORD});
    let body_b = json!({"sessionId": second, "password": TEST_PASSWORD});
    let (a, b) = tokio::join!(
        app.post("/registration/complete", &body_a),
        app.post("/registration/complete", &body_b),
    );

    let mut statuses = [a.status, b.status];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::BAD_REQUEST]);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_expired_drafts_are_hidden_and_purged() {
    let url = SecretString::from(std::env::var("DATABASE_URL").expect("DATABASE_URL set"));
    let pool = db::create_pool(&url).await.expect("database reachable");
    db::MIGRATOR.run(&pool).await.expect("migrations apply");

    let mut config = ApiConfig::development(SecretString::from(TEST_JWT_SECRET));
    config.draft_ttl = Duration::from_secs(1);
    let drafts = DraftStore::postgres(pool.clone(), config.draft_ttl);
    let state = AppState::from_parts(
        config,
        drafts.clone(),
        FarmerStore::postgres(pool),
        CacheStore::in_memory(100),
    )
    .expect("state builds");
    let app = TestApp::from_state(state);

    let step1 = app
        .post(
            "/registration/step1",
            &json!({"firstName": "Sita", "lastName": "Rai"}),
        )
        .await;
    let session_id = step1.body["sessionId"].as_str().unwrap().to_owned();

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let progress = app
        .get(&format!("/registration/progress/{session_id}"))
        .await;
    assert_eq!(progress.status, StatusCode::NOT_FOUND);
    assert!(drafts.purge_expired().await.unwrap() >= 1);
}
