//! Preferred language for advisory content.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a language code is not supported.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported language: {0} (expected \"en\" or \"ne\")")]
pub struct LanguageError(pub String);

/// The language a farmer wants advice in.
///
/// English is the default; Nepali requests are routed to the localized model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PreferredLanguage {
    /// English (`en`).
    #[default]
    #[serde(rename = "en")]
    English,
    /// Nepali (`ne`).
    #[serde(rename = "ne")]
    Nepali,
}

impl PreferredLanguage {
    /// Returns the ISO 639-1 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Nepali => "ne",
        }
    }

    /// Parse an ISO 639-1 code (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `LanguageError` for any code other than `en` or `ne`.
    pub fn parse(code: &str) -> Result<Self, LanguageError> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::English),
            "ne" => Ok(Self::Nepali),
            other => Err(LanguageError(other.to_owned())),
        }
    }
}

impl fmt::Display for PreferredLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for PreferredLanguage {
    type Err = LanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
