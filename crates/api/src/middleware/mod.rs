//! HTTP middleware stack for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS and compression
//! 5. Rate limiting on `/auth` and `/registration` (governor)

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{OptionalAuth, RequireAuth};
pub use rate_limit::{auth_rate_limiter, rate_limit_response, registration_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
