//! Text-to-speech over an OpenAI-compatible `audio/speech` endpoint.
//!
//! Shares the chat client's [`Sender`], so synthesis is throttled and retried
//! the same way.

use std::str::FromStr;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::config::ChatProviderConfig;

use super::client::{RetryPolicy, Sender};
use super::error::AiError;
use super::throttle::Throttle;

/// Longest text accepted for synthesis, in characters.
pub const MAX_SPEECH_CHARS: usize = 4000;

/// Output format requested from the provider.
const RESPONSE_FORMAT: &str = "mp3";

/// Errors validating a synthesis request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpeechError {
    #[error("Text is required")]
    Empty,
    #[error("Text must be at most {MAX_SPEECH_CHARS} characters")]
    TooLong,
    #[error("Invalid voice option. Must be one of: alloy, echo, fable, onyx, nova, shimmer")]
    InvalidVoice,
}

/// Voices the speech model offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
}

impl FromStr for Voice {
    type Err = SpeechError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alloy" => Ok(Self::Alloy),
            "echo" => Ok(Self::Echo),
            "fable" => Ok(Self::Fable),
            "onyx" => Ok(Self::Onyx),
            "nova" => Ok(Self::Nova),
            "shimmer" => Ok(Self::Shimmer),
            _ => Err(SpeechError::InvalidVoice),
        }
    }
}

/// Validated text and voice, ready to synthesize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechInput {
    text: String,
    voice: Voice,
}

impl SpeechInput {
    /// Trim `text` and resolve `voice`, defaulting to [`Voice::Alloy`].
    ///
    /// # Errors
    ///
    /// Returns `SpeechError` for blank or overlong text or an unknown voice.
    pub fn new(text: &str, voice: Option<&str>) -> Result<Self, SpeechError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SpeechError::Empty);
        }
        if text.chars().count() > MAX_SPEECH_CHARS {
            return Err(SpeechError::TooLong);
        }
        let voice = voice.map(Voice::from_str).transpose()?.unwrap_or_default();
        Ok(Self {
            text: text.to_owned(),
            voice,
        })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn voice(&self) -> Voice {
        self.voice
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: Voice,
    response_format: &'static str,
}

/// Speech synthesis client.
#[derive(Clone)]
pub struct SpeechClient {
    inner: Arc<SpeechClientInner>,
}

struct SpeechClientInner {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<SecretString>,
    model: String,
    sender: Sender,
}

impl std::fmt::Debug for SpeechClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechClient")
            .field("api_url", &self.inner.api_url)
            .field("model", &self.inner.model)
            .field("configured", &self.inner.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl SpeechClient {
    #[must_use]
    pub fn new(
        config: &ChatProviderConfig,
        http: reqwest::Client,
        retry: RetryPolicy,
        throttle: Throttle,
    ) -> Self {
        Self {
            inner: Arc::new(SpeechClientInner {
                http,
                api_url: config.api_url.clone(),
                api_key: config.api_key.clone(),
                model: config.model.clone(),
                sender: Sender {
                    provider: "speech",
                    retry,
                    throttle,
                },
            }),
        }
    }

    /// Synthesize `input` and return the encoded audio.
    ///
    /// # Errors
    ///
    /// Returns `AiError::NotConfigured` without a key, `AiError::Parse` for an
    /// empty body, otherwise the last failure once retries are exhausted.
    #[instrument(skip_all, fields(model = %self.inner.model, voice = ?input.voice))]
    pub async fn synthesize(&self, input: &SpeechInput) -> Result<Vec<u8>, AiError> {
        let inner = &self.inner;
        let api_key = inner
            .api_key
            .as_ref()
            .ok_or(AiError::NotConfigured(inner.sender.provider))?;

        let request = SpeechRequest {
            model: &inner.model,
            input: &input.text,
            voice: input.voice,
            response_format: RESPONSE_FORMAT,
        };

        let response = inner
            .sender
            .send(|| {
                inner
                    .http
                    .post(&inner.api_url)
                    .bearer_auth(api_key.expose_secret())
                    .json(&request)
            })
            .await?;

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(AiError::Parse("speech response was empty".to_owned()));
        }
        tracing::debug!(bytes = audio.len(), "Speech synthesized");
        Ok(audio.to_vec())
    }
}
