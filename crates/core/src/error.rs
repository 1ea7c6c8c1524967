//! Error types for the docforge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! `ProviderError` covers the provider contract; `GenerationError` is the
//! only failure that crosses the `generate()` boundary.

use std::time::Duration;
use thiserror::Error;

use crate::outcome::ValidationOutcome;

// --- Provider contract errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Provider overloaded: {0}")]
    Overloaded(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(", retry after {secs}s"),
        None => String::new(),
    }
}

impl ProviderError {
    /// Whether the failure is worth retrying on the same tier after a backoff.
    ///
    /// Rate limits are deliberately excluded: they end the task.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Overloaded(_) | Self::StreamInterrupted(_) | Self::Timeout(_) | Self::Network(_)
        )
    }
}

// --- Terminal generation errors ---

/// The terminal failure kinds a caller can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// The provider kept answering with prose instead of an artifact.
    NonArtifactResponse,
    /// Even the top tier could not produce a complete artifact.
    TruncatedAfterEscalation,
    /// Provider quota signal; never retried.
    RateLimited,
    /// Transient failures persisted past the retry budget.
    ProviderUnavailable,
    /// The caller interrupted the task. Not a failure.
    Cancelled,
}

impl std::fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonArtifactResponse => write!(f, "non_artifact_response"),
            Self::TruncatedAfterEscalation => write!(f, "truncated_after_escalation"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::ProviderUnavailable => write!(f, "provider_unavailable"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A terminal failure of one generation task.
///
/// `message` is meant for end users; the internal classification that led
/// here is available through `last_outcome`.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct GenerationError {
    pub kind: GenerationErrorKind,
    pub message: String,
    /// Suggested wait before the caller tries again (rate limits only).
    pub retry_after: Option<Duration>,
    /// The last validation outcome seen before giving up, if any attempt got that far.
    pub last_outcome: Option<ValidationOutcome>,
    /// Attempts that reached the provider before the task ended.
    pub attempts_made: u32,
}

impl GenerationError {
    pub fn new(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
            last_outcome: None,
            attempts_made: 0,
        }
    }

    pub fn cancelled(attempts_made: u32) -> Self {
        Self {
            attempts_made,
            ..Self::new(
                GenerationErrorKind::Cancelled,
                "Generation was cancelled; nothing was produced.",
            )
        }
    }

    pub fn rate_limited(retry_after_secs: Option<u64>, attempts_made: u32) -> Self {
        let message = match retry_after_secs {
            Some(secs) => format!("The provider is rate limiting requests. Try again in {secs}s."),
            None => "The provider is rate limiting requests. Try again later.".to_string(),
        };
        Self {
            retry_after: retry_after_secs.map(Duration::from_secs),
            attempts_made,
            ..Self::new(GenerationErrorKind::RateLimited, message)
        }
    }

    pub fn with_outcome(mut self, outcome: Option<ValidationOutcome>) -> Self {
        self.last_outcome = outcome;
        self
    }

    pub fn with_attempts(mut self, attempts_made: u32) -> Self {
        self.attempts_made = attempts_made;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == GenerationErrorKind::Cancelled
    }
}
