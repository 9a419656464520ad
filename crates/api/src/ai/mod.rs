//! External AI providers.
//!
//! - [`ChatClient`] - OpenAI-compatible chat completions (general and
//!   localized models)
//! - [`PlantRecognizer`] - Plant.id and Pl@ntNet image recognition
//! - [`SpeechClient`] - Text-to-speech for reading answers aloud
//!
//! Each provider gets its own [`Throttle`], so one busy provider never delays
//! another.

mod client;
mod error;
pub mod prompts;
mod speech;
mod throttle;
pub mod vision;

pub use client::{ChatClient, RetryPolicy};
pub use error::AiError;
pub use speech::{MAX_SPEECH_CHARS, SpeechClient, SpeechError, SpeechInput, Voice};
pub use throttle::Throttle;
pub use vision::{ImageError, PlantImage, PlantRecognizer, PlantSuggestion, RecognizerConfig};

use agrisathi_core::PreferredLanguage;

use crate::config::AiConfig;

/// Every AI client the API uses.
#[derive(Debug)]
pub struct AiClients {
    general: ChatClient,
    local: ChatClient,
    plants: PlantRecognizer,
    speech: SpeechClient,
}

impl AiClients {
    /// Build clients from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AiError::Http` if the HTTP client cannot be built.
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("agrisathi-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let retry = RetryPolicy {
            max_attempts: config.max_attempts,
            ..RetryPolicy::default()
        };
        let throttle = || Throttle::new(config.min_interval, config.requests_per_minute);
        let recognizer = |api_url: &str, api_key: Option<&secrecy::SecretString>| RecognizerConfig {
            api_url: api_url.to_owned(),
            api_key: api_key.cloned(),
            retry,
            throttle: throttle(),
        };

        Ok(Self {
            general: ChatClient::new("general", &config.general, http.clone(), retry, throttle()),
            local: ChatClient::new("local", &config.local, http.clone(), retry, throttle()),
            speech: SpeechClient::new(&config.speech, http.clone(), retry, throttle()),
            plants: PlantRecognizer::new(
                http,
                recognizer(&config.plant_id_api_url, config.plant_id_api_key.as_ref()),
                recognizer(&config.plantnet_api_url, config.plantnet_api_key.as_ref()),
            ),
        })
    }

    /// The general-purpose model.
    #[must_use]
    pub const fn general(&self) -> &ChatClient {
        &self.general
    }

    /// The model that should answer in `language`.
    ///
    /// Nepali goes to the localized model when it is configured, otherwise
    /// the general model is asked to answer in Nepali.
    #[must_use]
    pub fn for_language(&self, language: PreferredLanguage) -> &ChatClient {
        match language {
            PreferredLanguage::Nepali if self.local.is_configured() => &self.local,
            _ => &self.general,
        }
    }

    /// The plant recognizers.
    #[must_use]
    pub const fn plants(&self) -> &PlantRecognizer {
        &self.plants
    }

    /// The text-to-speech client.
    #[must_use]
    pub const fn speech(&self) -> &SpeechClient {
        &self.speech
    }
}
