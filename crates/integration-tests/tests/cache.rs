//! Integration tests for cache administration and cache expiry.

use std::time::Duration;

use axum::http::StatusCode;

use agrisathi_api::cache::CacheStore;
use agrisathi_integration_tests::TestApp;

#[tokio::test]
async fn test_stats_require_auth() {
    let app = TestApp::new();
    let response = app.get("/cache/stats").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_stats_report_memory_backend() {
    let app = TestApp::new();
    let (token, _) = app.register("stats@example.com").await;

    let response = app.get_auth("/cache/stats", &token).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["stats"]["backend"], "memory");
    assert_eq!(response.body["stats"]["connected"], true);
}

#[tokio::test]
async fn test_clear_by_pattern() {
    let app = TestApp::new();
    let (token, _) = app.register("clear@example.com").await;

    app.get("/registration/options").await;
    app.get_auth("/users/me", &token).await;

    let cleared = app
        .delete_auth("/cache/clear/registration:*", &token)
        .await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert_eq!(cleared.body["pattern"], "registration:*");
    assert_eq!(cleared.body["deletedCount"], 1);

    let options = app.get("/registration/options").await;
    assert_eq!(options.body["cached"], false);

    // Other namespaces are untouched
    let profile = app.get_auth("/users/me", &token).await;
    assert_eq!(profile.body["cached"], true);
}

#[tokio::test]
async fn test_clear_requires_auth_but_no_role() {
    let app = TestApp::new();

    let anonymous = app
        .request(axum::http::Method::DELETE, "/cache/clear", None, None)
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    // Any signed-in farmer may flush the cache
    let (token, _) = app.register("any-farmer@example.com").await;
    let cleared = app.delete_auth("/cache/clear", &token).await;
    assert_eq!(cleared.status, StatusCode::OK);
}

#[tokio::test]
async fn test_clear_all() {
    let app = TestApp::new();
    let (token, _) = app.register("clear-all@example.com").await;
    app.get("/registration/options").await;
    app.get_auth("/users/me", &token).await;

    let cleared = app.delete_auth("/cache/clear", &token).await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert_eq!(cleared.body["pattern"], "*");
    assert_eq!(cleared.body["deletedCount"], 2);

    let profile = app.get_auth("/users/me", &token).await;
    assert_eq!(profile.body["cached"], false);
}

#[tokio::test]
async fn test_entries_expire_after_ttl() {
    let cache = CacheStore::in_memory(100);
    cache
        .set("ttl:entry", &"value", Duration::from_secs(1))
        .await;
    assert_eq!(cache.get::<String>("ttl:entry").await.as_deref(), Some("value"));

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(cache.get::<String>("ttl:entry").await, None);
}

/// Same expiry check against a real Redis.
#[tokio::test]
#[ignore = "Requires Redis (REDIS_URL)"]
async fn test_redis_entries_expire_after_ttl() {
    use agrisathi_api::config::CacheConfig;
    use secrecy::SecretString;

    let url = std::env::var("REDIS_URL").expect("REDIS_URL set");
    let cache = CacheStore::connect(&CacheConfig {
        redis_url: Some(SecretString::from(url)),
        max_capacity: 100,
        ttls: agrisathi_api::cache::CacheTtls::default(),
    })
    .await;
    assert_eq!(cache.backend_name(), "redis");

    cache
        .set("ttl:entry:redis", &"value", Duration::from_millis(1500))
        .await;
    assert!(cache.exists("ttl:entry:redis").await);

    // Sub-second TTLs are kept, not rounded down to whole seconds
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(cache.exists("ttl:entry:redis").await);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!cache.exists("ttl:entry:redis").await);
}
