//! Error taxonomy for the generation core.
//!
//! Every failure the pipeline can produce is one of these variants.
//! HTTP status classification happens in the model client; everything
//! upstream only matches on the variant, never on raw status codes.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// No API key configured in settings.
    #[error("Please set your Gemini API key in the extension popup.")]
    ApiKeyMissing,

    /// 400 with an API_KEY_INVALID body, or 401/403.
    #[error("Invalid API key. Please check your API key and try again.")]
    ApiKeyInvalid,

    /// Transport-level failure - no HTTP response at all.
    #[error("Network error. Please check your internet connection.")]
    Network(String),

    /// HTTP 429. `retry_after` is the server's Retry-After header in seconds.
    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after: Option<u64>,
    },

    /// HTTP 500/502/503 - retryable.
    #[error("{message}")]
    ServiceUnavailable { status: u16, message: String },

    /// 2xx response whose content path is missing, or JSON-contract
    /// output that doesn't match the expected shape.
    #[error("Unexpected response format from Gemini API: {0}")]
    UnexpectedFormat(String),

    /// The UI surface reported a failed clipboard write.
    #[error("Failed to copy to clipboard. Please try again.")]
    Clipboard,

    #[error("An unexpected error occurred. Please try again.")]
    Unknown(String),
}

impl GenerationError {
    /// Transient failures worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited { .. } | GenerationError::ServiceUnavailable { .. }
        )
    }

    /// Key problems are terminal - retrying cannot fix configuration.
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            GenerationError::ApiKeyMissing | GenerationError::ApiKeyInvalid
        )
    }

    /// Seconds the server asked us to wait, if it told us.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            GenerationError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Human-readable message for the terminal error notification.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_covers_rate_limit_and_unavailable() {
        let rl = GenerationError::RateLimited {
            message: "Rate limit exceeded. Please wait a moment and try again.".into(),
            retry_after: Some(30),
        };
        let su = GenerationError::ServiceUnavailable {
            status: 503,
            message: "Gemini service temporarily unavailable. Please try again.".into(),
        };
        assert!(rl.is_retryable());
        assert!(su.is_retryable());
        assert!(!GenerationError::ApiKeyInvalid.is_retryable());
        assert!(!GenerationError::Network("timed out".into()).is_retryable());
    }

    #[test]
    fn key_errors_are_terminal() {
        assert!(GenerationError::ApiKeyMissing.is_key_error());
        assert!(GenerationError::ApiKeyInvalid.is_key_error());
        assert!(!GenerationError::Clipboard.is_key_error());
    }

    #[test]
    fn retry_after_only_on_rate_limit() {
        let rl = GenerationError::RateLimited {
            message: "wait".into(),
            retry_after: Some(7),
        };
        assert_eq!(rl.retry_after_secs(), Some(7));
        assert_eq!(GenerationError::ApiKeyMissing.retry_after_secs(), None);
    }
}
