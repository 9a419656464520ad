//! Advisory routes over the external AI providers.
//!
//! Text answers are cached per namespace; plant identification and speech
//! are not, since their payloads are binary.

use axum::{Json, extract::State};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use agrisathi_core::PreferredLanguage;

use crate::ai::{PlantImage, PlantSuggestion, SpeechInput, prompts};
use crate::cache::Cached;
use crate::cache::keys::{ai_response_key, diagnosis_key, weekly_tips_key};
use crate::error::{AppError, JsonBody, Result};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::state::AppState;

use super::users::load_profile;

/// Longest accepted question or symptom description, in characters.
const MAX_TEXT_LEN: usize = 2000;

/// Envelope shared by every advisory response.
#[derive(Debug, Serialize)]
pub struct AdviceResponse<T> {
    success: bool,
    data: T,
    cached: bool,
}

impl<T> From<Cached<T>> for AdviceResponse<T> {
    fn from(cached: Cached<T>) -> Self {
        Self {
            success: true,
            data: cached.value,
            cached: cached.cached,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: Option<String>,
    pub language: Option<PreferredLanguage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub language: PreferredLanguage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyTips {
    pub tips: String,
    pub week_of: chrono::NaiveDate,
    pub language: PreferredLanguage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnoseRequest {
    pub description: Option<String>,
    pub crop_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_type: Option<String>,
    pub diagnosis: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyRequest {
    pub image: Option<String>,
    pub crop_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identification {
    pub suggestions: Vec<PlantSuggestion>,
    /// Absent when the guide could not be generated.
    pub care_guide: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    pub text: Option<String>,
    pub voice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TtsResponse {
    success: bool,
    /// Base64 encoded MP3.
    audio: String,
}

/// POST /ai/ask
///
/// A signed-in asker's profile grounds the prompt and picks the default
/// language.
pub async fn ask(
    State(state): State<AppState>,
    OptionalAuth(claims): OptionalAuth,
    JsonBody(form): JsonBody<AskRequest>,
) -> Result<Json<AdviceResponse<Answer>>> {
    let question = required_text(form.question.as_deref(), "Question is required")?;

    let profile = match claims {
        Some(claims) => Some(load_profile(&state, claims.sub).await?.value),
        None => None,
    };
    let language = form
        .language
        .or_else(|| profile.as_ref().map(|p| p.preferred_language))
        .unwrap_or_default();

    let key = ai_response_key(&format!("{question}{}", language.code()), profile.as_ref());
    let ttl = state.config().cache.ttls.ai_response;
    let answer = state
        .cache()
        .get_or_compute(&key, ttl, || async {
            let answer = state
                .ai()
                .for_language(language)
                .complete(
                    &prompts::system_prompt(language),
                    &prompts::question_prompt(&question, profile.as_ref()),
                )
                .await?;
            Ok::<_, AppError>(Answer {
                question: question.clone(),
                answer,
                language,
            })
        })
        .await?;

    Ok(Json(answer.into()))
}

/// GET /ai/weekly-tips
pub async fn weekly_tips(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
) -> Result<Json<AdviceResponse<WeeklyTips>>> {
    let profile = load_profile(&state, claims.sub).await?.value;
    let language = profile.preferred_language;

    let key = weekly_tips_key(&claims.sub);
    let ttl = state.config().cache.ttls.weekly_tips;
    let tips = state
        .cache()
        .get_or_compute(&key, ttl, || async {
            let today = Utc::now().date_naive();
            let tips = state
                .ai()
                .for_language(language)
                .complete(
                    &prompts::system_prompt(language),
                    &prompts::weekly_tips_prompt(&profile, today),
                )
                .await?;
            Ok::<_, AppError>(WeeklyTips {
                tips,
                week_of: today,
                language,
            })
        })
        .await?;

    Ok(Json(tips.into()))
}

/// POST /ai/diagnose
pub async fn diagnose(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<DiagnoseRequest>,
) -> Result<Json<AdviceResponse<Diagnosis>>> {
    let description = required_text(form.description.as_deref(), "Description is required")?;
    let crop_type = form
        .crop_type
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_owned);

    let key = diagnosis_key(&description, crop_type.as_deref());
    let ttl = state.config().cache.ttls.diagnosis;
    let diagnosis = state
        .cache()
        .get_or_compute(&key, ttl, || async {
            let diagnosis = state
                .ai()
                .general()
                .complete(
                    &prompts::system_prompt(PreferredLanguage::English),
                    &prompts::diagnosis_prompt(&description, crop_type.as_deref()),
                )
                .await?;
            Ok::<_, AppError>(Diagnosis {
                description: description.clone(),
                crop_type: crop_type.clone(),
                diagnosis,
            })
        })
        .await?;

    Ok(Json(diagnosis.into()))
}

/// POST /ai/identify-plant
///
/// Succeeds when at least one recognizer answers. A failed care guide is
/// logged and left out rather than failing the identification.
pub async fn identify_plant(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<IdentifyRequest>,
) -> Result<Json<AdviceResponse<Identification>>> {
    let image = PlantImage::from_base64(form.image.as_deref().unwrap_or_default())
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let crop_type = form.crop_type.as_deref().map(str::trim).filter(|c| !c.is_empty());

    let suggestions = state.ai().plants().identify(&image).await?;

    let care_guide = match suggestions.first() {
        Some(top) => {
            let result = state
                .ai()
                .general()
                .complete(
                    &prompts::system_prompt(PreferredLanguage::English),
                    &prompts::care_guide_prompt(top, crop_type),
                )
                .await;
            match result {
                Ok(guide) => Some(guide),
                Err(e) => {
                    tracing::warn!(error = %e, plant = %top.scientific_name, "Care guide unavailable");
                    None
                }
            }
        }
        None => None,
    };

    tracing::info!(
        suggestions = suggestions.len(),
        top = suggestions.first().map(|s| s.scientific_name.as_str()),
        "Plant identified"
    );

    Ok(Json(AdviceResponse {
        success: true,
        data: Identification {
            suggestions,
            care_guide,
        },
        cached: false,
    }))
}

/// POST /ai/tts
///
/// Voice defaults to `alloy`. Audio is returned inline as base64.
pub async fn tts(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<TtsRequest>,
) -> Result<Json<TtsResponse>> {
    let input = SpeechInput::new(
        form.text.as_deref().unwrap_or_default(),
        form.voice.as_deref(),
    )
    .map_err(|e| AppError::Validation(e.to_string()))?;

    let audio = state.ai().speech().synthesize(&input).await?;

    tracing::info!(
        voice = ?input.voice(),
        chars = input.text().chars().count(),
        bytes = audio.len(),
        "Text read aloud"
    );

    Ok(Json(TtsResponse {
        success: true,
        audio: STANDARD.encode(audio),
    }))
}

fn required_text(input: Option<&str>, missing: &str) -> Result<String> {
    let text = input.unwrap_or_default().trim();
    if text.is_empty() {
        return Err(AppError::Validation(missing.to_owned()));
    }
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::Validation(format!(
            "Text must be at most {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(text.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_required_text_trims() {
        assert_eq!(required_text(Some("  blight?  "), "x").unwrap(), "blight?");
    }

    #[test]
    fn test_required_text_rejects_blank_and_long() {
        assert!(matches!(
            required_text(Some("   "), "Question is required"),
            Err(AppError::Validation(msg)) if msg == "Question is required"
        ));
        let long = "a".repeat(MAX_TEXT_LEN + 1);
        assert!(required_text(Some(&long), "x").is_err());
    }

    #[test]
    fn test_ask_request_language_code() {
        let form: AskRequest =
            serde_json::from_str(r#"{"question": "When to sow rice?", "language": "ne"}"#).unwrap();
        assert_eq!(form.language, Some(PreferredLanguage::Nepali));
    }

    #[test]
    fn test_missing_fields_report_their_name() {
        let ask: AskRequest = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            required_text(ask.question.as_deref(), "Question is required"),
            Err(AppError::Validation(msg)) if msg == "Question is required"
        ));

        let diagnose: DiagnoseRequest = serde_json::from_str(r#"{"cropType": "maize"}"#).unwrap();
        assert!(diagnose.description.is_none());

        let identify: IdentifyRequest = serde_json::from_str("{}").unwrap();
        assert!(identify.image.is_none());
    }
}
