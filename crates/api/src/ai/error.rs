//! Error types for the AI and plant recognition clients.

use thiserror::Error;

/// Errors that can occur when calling an external AI provider.
#[derive(Debug, Error)]
pub enum AiError {
    /// The provider has no API key configured.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// HTTP request failed (connect, timeout, body).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("{provider} returned status {status}")]
    Status {
        /// Provider name.
        provider: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// Provider kept rate limiting until attempts ran out.
    #[error("{provider} rate limited, retry after {retry_after} seconds")]
    RateLimited {
        /// Provider name.
        provider: &'static str,
        /// Seconds the provider asked us to wait.
        retry_after: u64,
    },

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),

    /// No recognizer produced a suggestion.
    #[error("no plant could be identified")]
    NoSuggestions,
}

impl AiError {
    /// Whether another attempt could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::NotConfigured(_) | Self::Parse(_) | Self::NoSuggestions => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(
            AiError::Status {
                provider: "general",
                status: 503
            }
            .is_retryable()
        );
        assert!(
            !AiError::Status {
                provider: "general",
                status: 400
            }
            .is_retryable()
        );
        assert!(
            AiError::RateLimited {
                provider: "general",
                retry_after: 1
            }
            .is_retryable()
        );
        assert!(!AiError::NotConfigured("general").is_retryable());
    }

    #[test]
    fn test_display() {
        let err = AiError::RateLimited {
            provider: "plant.id",
            retry_after: 60,
        };
        assert_eq!(err.to_string(), "plant.id rate limited, retry after 60 seconds");
    }
}
