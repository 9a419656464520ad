//! Test harness for AgriSathi integration tests.
//!
//! [`TestApp`] builds the complete router (middleware included) over
//! in-memory stores and drives it in-process with `tower::ServiceExt::oneshot`,
//! so the suite needs no running server, database or Redis.
//!
//! Tests that need real backends are `#[ignore]`d and read their connection
//! strings from the environment.

#![allow(clippy::missing_panics_doc)]

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use agrisathi_api::config::ApiConfig;
use agrisathi_api::routes;
use agrisathi_api::state::AppState;

/// Signing secret for test tokens.
pub const TEST_JWT_SECRET: &str = "tQ8vN3kZ7pR2xL5wB9mF4hJ6cY1sD0gA";

/// Password used by [`TestApp::register`].
pub const TEST_PASSWORD: &str = "Secret123";

/// Largest response body the harness will buffer.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Each app gets its own client address so rate limit buckets never leak
/// between tests running in the same process.
static NEXT_CLIENT: AtomicU32 = AtomicU32::new(1);

/// A response with its body parsed as JSON.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    /// The `x-request-id` the server answered with.
    pub request_id: Option<String>,
    /// JSON body, or a JSON string holding the raw text when the body is not JSON.
    pub body: Value,
}

impl TestResponse {
    /// The `error.code` of an error envelope.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        self.body["error"]["code"].as_str()
    }

    /// The `error.message` of an error envelope.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.body["error"]["message"].as_str()
    }
}

/// The full application over in-memory backends.
#[derive(Clone)]
pub struct TestApp {
    router: Router,
    state: AppState,
    client_ip: String,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// App with development defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// App with development defaults adjusted by `configure`.
    #[must_use]
    pub fn with_config(configure: impl FnOnce(&mut ApiConfig)) -> Self {
        let mut config = ApiConfig::development(SecretString::from(TEST_JWT_SECRET));
        configure(&mut config);
        let state = AppState::in_memory(config).expect("in-memory state builds");
        Self::from_state(state)
    }

    /// App over an already-built state, for tests with real backends.
    #[must_use]
    pub fn from_state(state: AppState) -> Self {
        let n = NEXT_CLIENT.fetch_add(1, Ordering::Relaxed);
        let [_, a, b, c] = n.to_be_bytes();
        let client_ip = Ipv4Addr::new(10, a, b, c).to_string();
        Self {
            router: routes::app(state.clone()),
            state,
            client_ip,
        }
    }

    /// Shared application state, for inspecting stores directly.
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Send one request through the full middleware stack.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", &self.client_ip);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        self.send(request).await
    }

    /// Send a prepared request, for cases the helpers do not cover.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = to_bytes(response.into_body(), MAX_BODY_BYTES)
            .await
            .expect("body readable");
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        TestResponse {
            status,
            request_id,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None, None).await
    }

    pub async fn get_auth(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, None, Some(token)).await
    }

    pub async fn post(&self, uri: &str, body: &Value) -> TestResponse {
        self.request(Method::POST, uri, Some(body), None).await
    }

    pub async fn post_auth(&self, uri: &str, body: &Value, token: &str) -> TestResponse {
        self.request(Method::POST, uri, Some(body), Some(token)).await
    }

    pub async fn patch_auth(&self, uri: &str, body: &Value, token: &str) -> TestResponse {
        self.request(Method::PATCH, uri, Some(body), Some(token)).await
    }

    pub async fn delete_auth(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::DELETE, uri, None, Some(token)).await
    }

    /// Run steps 1-5 and return the session id.
    pub async fn fill_draft(&self, email: &str) -> String {
        let first = self
            .post(
                "/registration/step1",
                &json!({"firstName": "Ram", "lastName": "Thapa"}),
            )
            .await;
        assert_eq!(first.status, StatusCode::OK, "step1: {:?}", first.body);
        let session_id = first.body["sessionId"]
            .as_str()
            .expect("step1 returns a session id")
            .to_owned();

        let steps = [
            (
                "/registration/step2",
                json!({"sessionId": session_id, "province": "Bagmati", "district": "Kathmandu", "municipality": "Kathmandu Metropolitan City"}),
            ),
            (
                "/registration/step3",
                json!({"sessionId": session_id, "farmerType": "crops"}),
            ),
            (
                "/registration/step4",
                json!({"sessionId": session_id, "economicScale": "small"}),
            ),
            (
                "/registration/step5",
                json!({"sessionId": session_id, "email": email}),
            ),
        ];
        for (uri, body) in &steps {
            let response = self.post(uri, body).await;
            assert_eq!(response.status, StatusCode::OK, "{uri}: {:?}", response.body);
        }

        session_id
    }

    /// Register a farmer through all six steps and return the bearer token
    /// and the created user.
    pub async fn register(&self, email: &str) -> (String, Value) {
        let session_id = self.fill_draft(email).await;
        let response = self
            .post(
                "/registration/complete",
                &json!({"sessionId": session_id, "password": TEST_PASSWORD}),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "complete: {:?}", response.body);

        let token = response.body["token"]
            .as_str()
            .expect("completion returns a token")
            .to_owned();
        (token, response.body["user"].clone())
    }
}
