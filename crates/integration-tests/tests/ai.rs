//! Integration tests for the advisory routes.
//!
//! Chat providers are replaced by a local axum server that counts calls, so
//! cache hits can be told apart from provider round trips.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    http::{Request, StatusCode, header},
    routing::post,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::SecretString;
use serde_json::json;

use agrisathi_integration_tests::TestApp;

/// Serve a chat provider that always answers `reply`.
async fn fake_provider(reply: &'static str) -> (String, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": reply}}]
                }))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.ok() });
    (format!("http://{addr}/v1/chat/completions"), calls)
}

/// Bytes the fake speech provider answers with (an MP3 frame header).
const FAKE_AUDIO: [u8; 4] = [0xFF, 0xFB, 0x90, 0x64];

/// Serve a speech provider that records the last request body.
async fn fake_speech_provider() -> (String, Arc<std::sync::Mutex<Option<serde_json::Value>>>) {
    let seen = Arc::new(std::sync::Mutex::new(None));
    let recorder = Arc::clone(&seen);
    let app = Router::new().route(
        "/v1/audio/speech",
        post(move |Json(body): Json<serde_json::Value>| {
            let recorder = Arc::clone(&recorder);
            async move {
                *recorder.lock().unwrap() = Some(body);
                FAKE_AUDIO.to_vec()
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.ok() });
    (format!("http://{addr}/v1/audio/speech"), seen)
}

/// App whose speech endpoint is the fake provider at `url`.
fn app_with_speech(url: String) -> TestApp {
    TestApp::with_config(|config| {
        config.ai.speech.api_url = url;
        config.ai.speech.api_key = Some(SecretString::from("test-key"));
        config.ai.min_interval = Duration::ZERO;
        config.ai.max_attempts = 1;
    })
}

/// App whose general model is the fake provider at `url`.
fn app_with_general(url: String) -> TestApp {
    TestApp::with_config(|config| {
        config.ai.general.api_url = url;
        config.ai.general.api_key = Some(SecretString::from("test-key"));
        config.ai.min_interval = Duration::ZERO;
        config.ai.max_attempts = 1;
    })
}

// ============================================================================
// Questions
// ============================================================================

#[tokio::test]
async fn test_ask_is_cached() {
    let (url, calls) = fake_provider("Sow rice after the first monsoon rains.").await;
    let app = app_with_general(url);
    let question = json!({"question": "When should I sow rice?"});

    let first = app.post("/ai/ask", &question).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["cached"], false);
    assert_eq!(
        first.body["data"]["answer"],
        "Sow rice after the first monsoon rains."
    );
    assert_eq!(first.body["data"]["language"], "en");

    let second = app.post("/ai/ask", &question).await;
    assert_eq!(second.body["cached"], true);
    assert_eq!(second.body["data"], first.body["data"]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A different language is a different answer
    let nepali = app
        .post(
            "/ai/ask",
            &json!({"question": "When should I sow rice?", "language": "ne"}),
        )
        .await;
    assert_eq!(nepali.body["cached"], false);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_nepali_goes_to_local_model() {
    let (general_url, general_calls) = fake_provider("general").await;
    let (local_url, local_calls) = fake_provider("स्थानीय").await;
    let app = TestApp::with_config(|config| {
        config.ai.general.api_url = general_url;
        config.ai.general.api_key = Some(SecretString::from("test-key"));
        config.ai.local.api_url = local_url;
        config.ai.local.api_key = Some(SecretString::from("local-key"));
        config.ai.min_interval = Duration::ZERO;
    });

    let response = app
        .post(
            "/ai/ask",
            &json!({"question": "धान कहिले रोप्ने?", "language": "ne"}),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["answer"], "स्थानीय");
    assert_eq!(local_calls.load(Ordering::SeqCst), 1);
    assert_eq!(general_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ask_uses_profile_language() {
    let (url, _) = fake_provider("Mulch the tomatoes.").await;
    let app = app_with_general(url);
    let (token, _) = app.register("asker@example.com").await;
    app.patch_auth("/users/me", &json!({"preferredLanguage": "ne"}), &token)
        .await;

    let response = app
        .post_auth("/ai/ask", &json!({"question": "Tomato care?"}), &token)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["language"], "ne");
}

#[tokio::test]
async fn test_ask_rejects_blank_question() {
    let app = TestApp::new();
    let response = app.post("/ai/ask", &json!({"question": "   "})).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_message(), Some("Question is required"));
}

#[tokio::test]
async fn test_missing_fields_are_named() {
    let app = TestApp::new();

    let ask = app.post("/ai/ask", &json!({})).await;
    assert_eq!(ask.status, StatusCode::BAD_REQUEST);
    assert_eq!(ask.error_code(), Some("VALIDATION_ERROR"));
    assert_eq!(ask.error_message(), Some("Question is required"));

    let diagnose = app
        .post("/ai/diagnose", &json!({"cropType": "maize"}))
        .await;
    assert_eq!(diagnose.error_message(), Some("Description is required"));

    let identify = app.post("/ai/identify-plant", &json!({})).await;
    assert_eq!(identify.error_message(), Some("Image is required"));
}

#[tokio::test]
async fn test_unconfigured_provider_reports_correlation_id() {
    let app = TestApp::new();
    let request = Request::post("/ai/ask")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-request-id", "req-farm-42")
        .body(Body::from(json!({"question": "Why are my leaves yellow?"}).to_string()))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.error_code(), Some("UPSTREAM_UNAVAILABLE"));
    assert_eq!(response.request_id.as_deref(), Some("req-farm-42"));
    assert_eq!(response.body["error"]["correlationId"], "req-farm-42");
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let app = TestApp::new();
    let question = json!({"question": "Is this cached?"});

    let first = app.post("/ai/ask", &question).await;
    let second = app.post("/ai/ask", &question).await;
    assert_eq!(first.status, StatusCode::BAD_GATEWAY);
    assert_eq!(second.status, StatusCode::BAD_GATEWAY);
}

// ============================================================================
// Weekly tips and diagnosis
// ============================================================================

#[tokio::test]
async fn test_weekly_tips() {
    let (url, calls) = fake_provider("Weed the maize this week.").await;
    let app = app_with_general(url);

    let anonymous = app.get("/ai/weekly-tips").await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let (token, _) = app.register("tips@example.com").await;
    let first = app.get_auth("/ai/weekly-tips", &token).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["data"]["tips"], "Weed the maize this week.");
    assert!(first.body["data"]["weekOf"].is_string());

    let second = app.get_auth("/ai/weekly-tips", &token).await;
    assert_eq!(second.body["cached"], true);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Editing the profile drops the tailored tips
    app.patch_auth(
        "/users/me",
        &json!({"farmInfo": {"farmerType": "livestock", "economicScale": "medium"}}),
        &token,
    )
    .await;
    let third = app.get_auth("/ai/weekly-tips", &token).await;
    assert_eq!(third.body["cached"], false);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_diagnose() {
    let (url, calls) = fake_provider("Likely early blight; remove lower leaves.").await;
    let app = app_with_general(url);
    let body = json!({"description": "Brown rings on lower leaves", "cropType": "tomato"});

    let first = app.post("/ai/diagnose", &body).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["data"]["cropType"], "tomato");
    assert_eq!(
        first.body["data"]["diagnosis"],
        "Likely early blight; remove lower leaves."
    );

    let second = app.post("/ai/diagnose", &body).await;
    assert_eq!(second.body["cached"], true);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let blank = app.post("/ai/diagnose", &json!({"description": ""})).await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
    assert_eq!(blank.error_message(), Some("Description is required"));
}

// ============================================================================
// Plant identification
// ============================================================================

#[tokio::test]
async fn test_identify_rejects_bad_image() {
    let app = TestApp::new();
    let response = app
        .post("/ai/identify-plant", &json!({"image": "%%% not base64 %%%"}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), Some("VALIDATION_ERROR"));
}

#[tokio::test]
async fn test_identify_without_recognizers_is_upstream_error() {
    let app = TestApp::new();
    // A 1x1 PNG
    let png = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";
    let response = app
        .post("/ai/identify-plant", &json!({"image": png}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
}

// ============================================================================
// Text-to-speech
// ============================================================================

#[tokio::test]
async fn test_tts_returns_base64_audio() {
    let (url, seen) = fake_speech_provider().await;
    let app = app_with_speech(url);

    let response = app
        .post("/ai/tts", &json!({"text": "  Irrigate the wheat today.  "}))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    let audio = STANDARD
        .decode(response.body["audio"].as_str().unwrap())
        .unwrap();
    assert_eq!(audio, FAKE_AUDIO);

    let sent = seen.lock().unwrap().take().unwrap();
    assert_eq!(sent["model"], "tts-1");
    assert_eq!(sent["voice"], "alloy");
    assert_eq!(sent["input"], "Irrigate the wheat today.");

    let nova = app
        .post("/ai/tts", &json!({"text": "Namaste", "voice": "nova"}))
        .await;
    assert_eq!(nova.status, StatusCode::OK);
    assert_eq!(seen.lock().unwrap().take().unwrap()["voice"], "nova");
}

#[tokio::test]
async fn test_tts_rejects_blank_text() {
    let (url, seen) = fake_speech_provider().await;
    let app = app_with_speech(url);

    for body in [json!({"text": "   "}), json!({})] {
        let response = app.post("/ai/tts", &body).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.error_code(), Some("VALIDATION_ERROR"));
        assert_eq!(response.error_message(), Some("Text is required"));
    }
    assert!(seen.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_tts_rejects_text_over_limit() {
    let (url, seen) = fake_speech_provider().await;
    let app = app_with_speech(url);

    let response = app
        .post("/ai/tts", &json!({"text": "a".repeat(4001)}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), Some("VALIDATION_ERROR"));
    assert_eq!(
        response.error_message(),
        Some("Text must be at most 4000 characters")
    );
    assert!(seen.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_tts_rejects_unknown_voice() {
    let (url, seen) = fake_speech_provider().await;
    let app = app_with_speech(url);

    let response = app
        .post("/ai/tts", &json!({"text": "Hello", "voice": "baritone"}))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), Some("VALIDATION_ERROR"));
    assert_eq!(
        response.error_message(),
        Some("Invalid voice option. Must be one of: alloy, echo, fable, onyx, nova, shimmer")
    );
    assert!(seen.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_tts_without_key_is_upstream_error() {
    let app = TestApp::new();
    let response = app.post("/ai/tts", &json!({"text": "Hello"})).await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.error_code(), Some("UPSTREAM_UNAVAILABLE"));
}
