//! Plant identification from a photo.
//!
//! Queries Plant.id and Pl@ntNet concurrently and merges their suggestions by
//! scientific name. One recognizer failing is tolerated as long as the other
//! answers.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::client::Sender;
use super::error::AiError;

/// Most suggestions returned to callers.
pub const MAX_SUGGESTIONS: usize = 5;

/// Largest accepted decoded image.
pub const MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;

const PLANT_ID: &str = "plant.id";
const PLANTNET: &str = "plantnet";

/// Errors decoding an uploaded image.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("Image is required")]
    Empty,
    #[error("Image must be base64 encoded")]
    InvalidBase64,
    #[error("Image is too large")]
    TooLarge,
}

/// A decoded photo, kept in both forms the providers want.
#[derive(Debug, Clone)]
pub struct PlantImage {
    bytes: Vec<u8>,
    base64: String,
}

impl PlantImage {
    /// Decode a base64 image, with or without a `data:` URL prefix.
    ///
    /// # Errors
    ///
    /// Returns `ImageError` if the input is empty, not base64, or too large.
    pub fn from_base64(input: &str) -> Result<Self, ImageError> {
        let data = input.trim();
        let data = data
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
            .map_or(data, |(_, payload)| payload);
        if data.is_empty() {
            return Err(ImageError::Empty);
        }

        let bytes = STANDARD.decode(data).map_err(|_| ImageError::InvalidBase64)?;
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge);
        }

        Ok(Self {
            bytes,
            base64: data.to_owned(),
        })
    }
}

/// One candidate species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantSuggestion {
    pub scientific_name: String,
    pub common_names: Vec<String>,
    /// Highest probability any provider gave, `0.0..=1.0`.
    pub confidence: f64,
    pub providers: Vec<String>,
}

/// Merge per-provider suggestions by scientific name (case-insensitive).
///
/// Merged entries keep the highest confidence, the union of common names and
/// every provider that proposed them. Output is sorted by confidence,
/// descending, and truncated to [`MAX_SUGGESTIONS`].
#[must_use]
pub fn merge_suggestions(batches: Vec<Vec<PlantSuggestion>>) -> Vec<PlantSuggestion> {
    let mut merged: HashMap<String, PlantSuggestion> = HashMap::new();

    for suggestion in batches.into_iter().flatten() {
        let key = suggestion.scientific_name.trim().to_lowercase();
        match merged.get_mut(&key) {
            Some(existing) => {
                existing.confidence = existing.confidence.max(suggestion.confidence);
                for name in suggestion.common_names {
                    if !existing
                        .common_names
                        .iter()
                        .any(|n| n.eq_ignore_ascii_case(&name))
                    {
                        existing.common_names.push(name);
                    }
                }
                for provider in suggestion.providers {
                    if !existing.providers.contains(&provider) {
                        existing.providers.push(provider);
                    }
                }
            }
            None => {
                merged.insert(key, suggestion);
            }
        }
    }

    let mut suggestions: Vec<_> = merged.into_values().collect();
    suggestions.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.scientific_name.cmp(&b.scientific_name))
    });
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

// Plant.id v3 response
#[derive(Deserialize)]
struct PlantIdResponse {
    result: PlantIdResult,
}

#[derive(Deserialize)]
struct PlantIdResult {
    classification: PlantIdClassification,
}

#[derive(Deserialize)]
struct PlantIdClassification {
    suggestions: Vec<PlantIdSuggestion>,
}

#[derive(Deserialize)]
struct PlantIdSuggestion {
    name: String,
    probability: f64,
    #[serde(default)]
    details: Option<PlantIdDetails>,
}

#[derive(Deserialize)]
struct PlantIdDetails {
    #[serde(default)]
    common_names: Option<Vec<String>>,
}

// Pl@ntNet v2 response
#[derive(Deserialize)]
struct PlantNetResponse {
    results: Vec<PlantNetResult>,
}

#[derive(Deserialize)]
struct PlantNetResult {
    score: f64,
    species: PlantNetSpecies,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlantNetSpecies {
    scientific_name_without_author: String,
    #[serde(default)]
    common_names: Vec<String>,
}

struct Recognizer {
    api_url: String,
    api_key: Option<SecretString>,
    sender: Sender,
}

/// Client for the two plant recognition providers.
pub struct PlantRecognizer {
    http: reqwest::Client,
    plant_id: Recognizer,
    plantnet: Recognizer,
}

impl std::fmt::Debug for PlantRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlantRecognizer")
            .field("plant_id", &self.plant_id.api_key.is_some())
            .field("plantnet", &self.plantnet.api_key.is_some())
            .finish_non_exhaustive()
    }
}

/// Endpoint, key and pacing for one recognizer.
pub struct RecognizerConfig {
    pub api_url: String,
    pub api_key: Option<SecretString>,
    pub retry: super::RetryPolicy,
    pub throttle: super::Throttle,
}

impl PlantRecognizer {
    /// Create a recognizer pair using a shared HTTP client.
    #[must_use]
    pub fn new(http: reqwest::Client, plant_id: RecognizerConfig, plantnet: RecognizerConfig) -> Self {
        let recognizer = |provider, config: RecognizerConfig| Recognizer {
            api_url: config.api_url,
            api_key: config.api_key,
            sender: Sender {
                provider,
                retry: config.retry,
                throttle: config.throttle,
            },
        };
        Self {
            http,
            plant_id: recognizer(PLANT_ID, plant_id),
            plantnet: recognizer(PLANTNET, plantnet),
        }
    }

    /// Whether at least one provider has a key.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.plant_id.api_key.is_some() || self.plantnet.api_key.is_some()
    }

    /// Identify the plant in `image`.
    ///
    /// # Errors
    ///
    /// Returns `AiError::NotConfigured` if neither provider has a key,
    /// `AiError::NoSuggestions` if the providers answered with nothing, or
    /// the first provider failure if both failed.
    pub async fn identify(&self, image: &PlantImage) -> Result<Vec<PlantSuggestion>, AiError> {
        let (plant_id, plantnet) = tokio::join!(self.query_plant_id(image), self.query_plantnet(image));

        let mut batches = Vec::new();
        let mut failure = None;
        for (provider, result) in [(PLANT_ID, plant_id), (PLANTNET, plantnet)] {
            match result {
                Ok(batch) => batches.push(batch),
                Err(AiError::NotConfigured(_)) => {}
                Err(e) => {
                    tracing::warn!(provider, error = %e, "Plant recognizer failed");
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }

        if batches.is_empty() {
            return Err(failure.unwrap_or(AiError::NotConfigured("plant recognition")));
        }

        let suggestions = merge_suggestions(batches);
        if suggestions.is_empty() {
            return Err(AiError::NoSuggestions);
        }
        Ok(suggestions)
    }

    async fn query_plant_id(&self, image: &PlantImage) -> Result<Vec<PlantSuggestion>, AiError> {
        let recognizer = &self.plant_id;
        let api_key = recognizer
            .api_key
            .as_ref()
            .ok_or(AiError::NotConfigured(PLANT_ID))?;
        let url = format!("{}?details=common_names", recognizer.api_url);
        let body = serde_json::json!({
            "images": [image.base64],
            "similar_images": false,
        });

        let response = recognizer
            .sender
            .send(|| {
                self.http
                    .post(&url)
                    .header("Api-Key", api_key.expose_secret())
                    .json(&body)
            })
            .await?;

        let parsed: PlantIdResponse = response
            .json()
            .await
            .map_err(|e| AiError::Parse(format!("plant.id response: {e}")))?;

        Ok(parsed
            .result
            .classification
            .suggestions
            .into_iter()
            .map(|s| PlantSuggestion {
                scientific_name: s.name,
                common_names: s.details.and_then(|d| d.common_names).unwrap_or_default(),
                confidence: s.probability.clamp(0.0, 1.0),
                providers: vec![PLANT_ID.to_owned()],
            })
            .collect())
    }

    async fn query_plantnet(&self, image: &PlantImage) -> Result<Vec<PlantSuggestion>, AiError> {
        let recognizer = &self.plantnet;
        let api_key = recognizer
            .api_key
            .as_ref()
            .ok_or(AiError::NotConfigured(PLANTNET))?;

        let url = format!("{}?api-key={}", recognizer.api_url, api_key.expose_secret());

        let response = recognizer
            .sender
            .send(|| {
                let form = Form::new()
                    .part(
                        "images",
                        Part::bytes(image.bytes.clone()).file_name("plant.jpg"),
                    )
                    .text("organs", "auto");
                self.http.post(&url).multipart(form)
            })
            .await?;

        let parsed: PlantNetResponse = response
            .json()
            .await
            .map_err(|e| AiError::Parse(format!("plantnet response: {e}")))?;

        Ok(parsed
            .results
            .into_iter()
            .map(|r| PlantSuggestion {
                scientific_name: r.species.scientific_name_without_author,
                common_names: r.species.common_names,
                confidence: r.score.clamp(0.0, 1.0),
                providers: vec![PLANTNET.to_owned()],
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn suggestion(name: &str, confidence: f64, provider: &str, common: &[&str]) -> PlantSuggestion {
        PlantSuggestion {
            scientific_name: name.into(),
            common_names: common.iter().map(|s| (*s).to_owned()).collect(),
            confidence,
            providers: vec![provider.into()],
        }
    }

    #[test]
    fn test_merge_by_scientific_name() {
        let merged = merge_suggestions(vec![
            vec![
                suggestion("Solanum lycopersicum", 0.62, PLANT_ID, &["Tomato"]),
                suggestion("Capsicum annuum", 0.20, PLANT_ID, &[]),
            ],
            vec![suggestion("solanum lycopersicum", 0.81, PLANTNET, &["tomato", "Love apple"])],
        ]);

        assert_eq!(merged.len(), 2);
        let top = &merged[0];
        assert_eq!(top.scientific_name, "Solanum lycopersicum");
        assert!((top.confidence - 0.81).abs() < f64::EPSILON);
        assert_eq!(top.providers, vec![PLANT_ID, PLANTNET]);
        assert_eq!(top.common_names, vec!["Tomato", "Love apple"]);
    }

    #[test]
    fn test_merge_truncates() {
        let batch = (0..10)
            .map(|i| suggestion(&format!("Species {i}"), f64::from(i) / 10.0, PLANTNET, &[]))
            .collect();
        let merged = merge_suggestions(vec![batch]);
        assert_eq!(merged.len(), MAX_SUGGESTIONS);
        assert_eq!(merged[0].scientific_name, "Species 9");
    }

    #[test]
    fn test_image_decoding() {
        let encoded = STANDARD.encode(b"\xff\xd8\xff\xe0jpeg");
        let image = PlantImage::from_base64(&format!("data:image/jpeg;base64,{encoded}")).unwrap();
        assert_eq!(image.bytes, b"\xff\xd8\xff\xe0jpeg");
        assert_eq!(image.base64, encoded);

        assert_eq!(PlantImage::from_base64("  ").unwrap_err(), ImageError::Empty);
        assert_eq!(
            PlantImage::from_base64("not base64!").unwrap_err(),
            ImageError::InvalidBase64
        );
    }

    #[tokio::test]
    async fn test_unconfigured_recognizers() {
        let config = || RecognizerConfig {
            api_url: "http://127.0.0.1:1".into(),
            api_key: None,
            retry: super::super::RetryPolicy::default(),
            throttle: super::super::Throttle::new(std::time::Duration::ZERO, 10),
        };
        let recognizer = PlantRecognizer::new(reqwest::Client::new(), config(), config());
        assert!(!recognizer.is_configured());

        let image = PlantImage::from_base64(&STANDARD.encode(b"img")).unwrap();
        assert!(matches!(
            recognizer.identify(&image).await,
            Err(AiError::NotConfigured(_))
        ));
    }
}
