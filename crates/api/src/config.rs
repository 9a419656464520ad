//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `AGRISATHI_JWT_SECRET` - JWT signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `AGRISATHI_HOST` - Bind address (default: 127.0.0.1)
//! - `AGRISATHI_PORT` - Listen port (default: 3000)
//! - `AGRISATHI_BASE_URL` - Public URL used in email links (default: <http://localhost:3000>)
//! - `AGRISATHI_DATABASE_URL` / `DATABASE_URL` - `PostgreSQL` connection string
//!   (absent: in-memory stores)
//! - `AGRISATHI_JWT_TTL_HOURS` - Auth token lifetime (default: 168)
//! - `AGRISATHI_DRAFT_TTL_HOURS` - Registration draft lifetime (default: 24)
//! - `REDIS_URL` - Redis connection string (absent: in-memory cache)
//! - `CACHE_TTL_USER_PROFILE`, `CACHE_TTL_AI_RESPONSE`, `CACHE_TTL_REGISTRATION_OPTIONS`,
//!   `CACHE_TTL_WEEKLY_TIPS`, `CACHE_TTL_DIAGNOSIS` - Per-namespace TTLs in seconds
//! - `CACHE_MAX_CAPACITY` - In-memory cache capacity (default: 10000)
//! - `AI_GENERAL_API_URL`, `AI_GENERAL_API_KEY`, `AI_GENERAL_MODEL` - General model
//! - `AI_LOCAL_API_URL`, `AI_LOCAL_API_KEY`, `AI_LOCAL_MODEL` - Localized (Nepali) model
//! - `AI_SPEECH_API_URL`, `AI_SPEECH_API_KEY`, `AI_SPEECH_MODEL` - Text-to-speech
//!   (key defaults to `AI_GENERAL_API_KEY`, model to `tts-1`)
//! - `PLANT_ID_API_KEY`, `PLANTNET_API_KEY` - Plant recognition providers
//!   (`PLANT_ID_API_URL`, `PLANTNET_API_URL` override the endpoints)
//! - `AI_TIMEOUT_SECONDS`, `AI_MAX_RETRIES`, `AI_MIN_INTERVAL_MS`, `AI_REQUESTS_PER_MINUTE`
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` - Outgoing
//!   email (absent: emails are logged instead of sent)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::cache::CacheTtls;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_GENERAL_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_GENERAL_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LOCAL_MODEL: &str = "gpt-4o-mini";
const DEFAULT_SPEECH_API_URL: &str = "https://api.openai.com/v1/audio/speech";
const DEFAULT_SPEECH_MODEL: &str = "tts-1";
const DEFAULT_PLANT_ID_API_URL: &str = "https://plant.id/api/v3/identification";
const DEFAULT_PLANTNET_API_URL: &str = "https://my-api.plantnet.org/v2/identify/all";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL (used to build links in emails)
    pub base_url: String,
    /// `PostgreSQL` connection URL; `None` selects the in-memory stores
    pub database_url: Option<SecretString>,
    /// JWT signing secret
    pub jwt_secret: SecretString,
    /// Lifetime of issued auth tokens
    pub jwt_ttl: Duration,
    /// Fixed lifetime of a registration draft, measured from first contact
    pub draft_ttl: Duration,
    /// Cache backend and TTL configuration
    pub cache: CacheConfig,
    /// External AI provider configuration
    pub ai: AiConfig,
    /// SMTP configuration; `None` logs emails instead of sending them
    pub email: Option<EmailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Cache configuration.
#[derive(Clone)]
pub struct CacheConfig {
    /// Redis connection URL; `None` selects the in-memory backend
    pub redis_url: Option<SecretString>,
    /// Capacity of the in-memory backend
    pub max_capacity: u64,
    /// Per-namespace time-to-live values
    pub ttls: CacheTtls,
}

impl std::fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("max_capacity", &self.max_capacity)
            .field("ttls", &self.ttls)
            .finish()
    }
}

/// An OpenAI-compatible provider endpoint (chat completions or speech).
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct ChatProviderConfig {
    /// Endpoint URL
    pub api_url: String,
    /// API key; `None` disables the provider
    pub api_key: Option<SecretString>,
    /// Model identifier
    pub model: String,
}

impl std::fmt::Debug for ChatProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatProviderConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .finish()
    }
}

/// External AI provider configuration.
#[derive(Clone)]
pub struct AiConfig {
    /// General-purpose model
    pub general: ChatProviderConfig,
    /// Localized-language (Nepali) model
    pub local: ChatProviderConfig,
    /// Text-to-speech endpoint
    pub speech: ChatProviderConfig,
    /// Plant.id identification endpoint
    pub plant_id_api_url: String,
    /// Plant.id API key
    pub plant_id_api_key: Option<SecretString>,
    /// Pl@ntNet identification endpoint
    pub plantnet_api_url: String,
    /// Pl@ntNet API key
    pub plantnet_api_key: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Maximum attempts per request (including the first)
    pub max_attempts: u32,
    /// Minimum spacing between requests to one provider
    pub min_interval: Duration,
    /// Rolling per-minute request budget per provider
    pub requests_per_minute: u32,
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("general", &self.general)
            .field("local", &self.local)
            .field("speech", &self.speech)
            .field("plant_id_api_url", &self.plant_id_api_url)
            .field("plantnet_api_url", &self.plantnet_api_url)
            .field(
                "plant_id_api_key",
                &self.plant_id_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "plantnet_api_key",
                &self.plantnet_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .field("min_interval", &self.min_interval)
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}

/// SMTP email configuration.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP relay host
    pub smtp_host: String,
    /// SMTP port
    pub smtp_port: u16,
    /// SMTP username
    pub smtp_username: String,
    /// SMTP password
    pub smtp_password: SecretString,
    /// Sender address
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env_or_default::<IpAddr>("AGRISATHI_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("AGRISATHI_PORT", "3000")?;
        let base_url = get_env_or_default("AGRISATHI_BASE_URL", "http://localhost:3000");
        let database_url = get_database_url("AGRISATHI_DATABASE_URL");

        let jwt_secret = get_validated_secret("AGRISATHI_JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "AGRISATHI_JWT_SECRET")?;
        let jwt_ttl = hours(parse_env_or_default::<u64>("AGRISATHI_JWT_TTL_HOURS", "168")?);
        let draft_ttl = hours(parse_env_or_default::<u64>("AGRISATHI_DRAFT_TTL_HOURS", "24")?);

        Ok(Self {
            host,
            port,
            base_url,
            database_url,
            jwt_secret,
            jwt_ttl,
            draft_ttl,
            cache: CacheConfig::from_env()?,
            ai: AiConfig::from_env()?,
            email: EmailConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or_default::<f32>("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env_or_default::<f32>(
                "SENTRY_TRACES_SAMPLE_RATE",
                "0.1",
            )?,
        })
    }

    /// Configuration for local development and tests.
    ///
    /// In-memory stores and cache, no AI keys, emails logged, defaults for
    /// every TTL.
    #[must_use]
    pub fn development(jwt_secret: SecretString) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            database_url: None,
            jwt_secret,
            jwt_ttl: hours(168),
            draft_ttl: hours(24),
            cache: CacheConfig {
                redis_url: None,
                max_capacity: 10_000,
                ttls: CacheTtls::default(),
            },
            ai: AiConfig {
                general: ChatProviderConfig {
                    api_url: DEFAULT_GENERAL_API_URL.to_string(),
                    api_key: None,
                    model: DEFAULT_GENERAL_MODEL.to_string(),
                },
                local: ChatProviderConfig {
                    api_url: DEFAULT_GENERAL_API_URL.to_string(),
                    api_key: None,
                    model: DEFAULT_LOCAL_MODEL.to_string(),
                },
                speech: ChatProviderConfig {
                    api_url: DEFAULT_SPEECH_API_URL.to_string(),
                    api_key: None,
                    model: DEFAULT_SPEECH_MODEL.to_string(),
                },
                plant_id_api_url: DEFAULT_PLANT_ID_API_URL.to_string(),
                plant_id_api_key: None,
                plantnet_api_url: DEFAULT_PLANTNET_API_URL.to_string(),
                plantnet_api_key: None,
                timeout: Duration::from_secs(30),
                max_attempts: 3,
                min_interval: Duration::from_millis(1000),
                requests_per_minute: 20,
            },
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CacheConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = CacheTtls::default();
        Ok(Self {
            redis_url: get_optional_env("REDIS_URL").map(SecretString::from),
            max_capacity: parse_env_or_default::<u64>("CACHE_MAX_CAPACITY", "10000")?,
            ttls: CacheTtls {
                user_profile: seconds_or("CACHE_TTL_USER_PROFILE", defaults.user_profile)?,
                ai_response: seconds_or("CACHE_TTL_AI_RESPONSE", defaults.ai_response)?,
                registration_options: seconds_or(
                    "CACHE_TTL_REGISTRATION_OPTIONS",
                    defaults.registration_options,
                )?,
                weekly_tips: seconds_or("CACHE_TTL_WEEKLY_TIPS", defaults.weekly_tips)?,
                diagnosis: seconds_or("CACHE_TTL_DIAGNOSIS", defaults.diagnosis)?,
            },
        })
    }
}

impl AiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let general = ChatProviderConfig {
            api_url: get_env_or_default("AI_GENERAL_API_URL", DEFAULT_GENERAL_API_URL),
            api_key: get_optional_env("AI_GENERAL_API_KEY").map(SecretString::from),
            model: get_env_or_default("AI_GENERAL_MODEL", DEFAULT_GENERAL_MODEL),
        };
        let local = ChatProviderConfig {
            api_url: get_optional_env("AI_LOCAL_API_URL").unwrap_or_else(|| general.api_url.clone()),
            api_key: get_optional_env("AI_LOCAL_API_KEY").map(SecretString::from),
            model: get_env_or_default("AI_LOCAL_MODEL", DEFAULT_LOCAL_MODEL),
        };
        let speech = ChatProviderConfig {
            api_url: get_env_or_default("AI_SPEECH_API_URL", DEFAULT_SPEECH_API_URL),
            api_key: get_optional_env("AI_SPEECH_API_KEY")
                .map(SecretString::from)
                .or_else(|| general.api_key.clone()),
            model: get_env_or_default("AI_SPEECH_MODEL", DEFAULT_SPEECH_MODEL),
        };
        let max_attempts = parse_env_or_default::<u32>("AI_MAX_RETRIES", "3")?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "AI_MAX_RETRIES".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let requests_per_minute = parse_env_or_default::<u32>("AI_REQUESTS_PER_MINUTE", "20")?;
        if requests_per_minute == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "AI_REQUESTS_PER_MINUTE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            general,
            local,
            speech,
            plant_id_api_url: get_env_or_default("PLANT_ID_API_URL", DEFAULT_PLANT_ID_API_URL),
            plant_id_api_key: get_optional_env("PLANT_ID_API_KEY").map(SecretString::from),
            plantnet_api_url: get_env_or_default("PLANTNET_API_URL", DEFAULT_PLANTNET_API_URL),
            plantnet_api_key: get_optional_env("PLANTNET_API_KEY").map(SecretString::from),
            timeout: Duration::from_secs(parse_env_or_default::<u64>("AI_TIMEOUT_SECONDS", "30")?),
            max_attempts,
            min_interval: Duration::from_millis(parse_env_or_default::<u64>(
                "AI_MIN_INTERVAL_MS",
                "1000",
            )?),
            requests_per_minute,
        })
    }
}

impl EmailConfig {
    /// Returns `Ok(None)` when `SMTP_HOST` is unset.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env_or_default::<u16>("SMTP_PORT", "587")?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_required_secret("SMTP_PASSWORD")?,
            from_address: get_env_or_default("EMAIL_FROM", "AgriSathi <no-reply@agrisathi.app>"),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

const fn hours(h: u64) -> Duration {
    Duration::from_secs(h * 60 * 60)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Option<SecretString> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a default literal.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a TTL override in seconds.
fn seconds_or(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    match get_optional_env(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
