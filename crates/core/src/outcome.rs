//! Attempts, validation outcomes, and the final generation result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ProviderError;
use crate::provider::{FinishReason, Usage};
use crate::tier::ModelTier;

/// What kind of reply the provider produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Artifact,
    Conversational,
    /// No markers and no recognizable hedging
    Empty,
}

impl Classification {
    /// Whether escalation logic should treat this reply as prose.
    pub fn is_non_artifact(self) -> bool {
        !matches!(self, Self::Artifact)
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Artifact => write!(f, "artifact"),
            Self::Conversational => write!(f, "conversational"),
            Self::Empty => write!(f, "empty"),
        }
    }
}

/// How complete an extracted artifact looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completeness {
    Complete,
    Truncated,
    TooShort,
    /// Accepted with a warning; never retried
    PossiblyIncomplete,
}

impl Completeness {
    /// Whether this outcome ends the task successfully.
    pub fn is_acceptable(self) -> bool {
        matches!(self, Self::Complete | Self::PossiblyIncomplete)
    }
}

impl std::fmt::Display for Completeness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Truncated => write!(f, "truncated"),
            Self::TooShort => write!(f, "too_short"),
            Self::PossiblyIncomplete => write!(f, "possibly_incomplete"),
        }
    }
}

/// The verdict on one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub classification: Classification,
    pub completeness: Completeness,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_artifact: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

impl ValidationOutcome {
    /// Outcome for a reply that held no artifact at all.
    pub fn non_artifact(classification: Classification, issue: impl Into<String>) -> Self {
        Self {
            classification,
            completeness: Completeness::TooShort,
            extracted_artifact: None,
            issues: vec![issue.into()],
        }
    }
}

/// One try against the provider. Built once its stream ends; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Attempt {
    /// 1-based attempt number within the task
    pub number: u32,
    pub tier: ModelTier,
    pub accumulated_text: String,
    pub finish_reason: FinishReason,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// Provider-reported usage, when the terminal chunk carried it
    pub usage: Option<Usage>,
    /// The error that ended the stream, when `finish_reason` is `Error`
    pub stream_error: Option<ProviderError>,
}

impl Attempt {
    /// Whether the provider signalled it ran out of output room.
    pub fn truncation_hint(&self) -> bool {
        self.finish_reason == FinishReason::LengthLimited
    }

    pub fn is_empty(&self) -> bool {
        self.accumulated_text.trim().is_empty()
    }
}

/// Compact record of an attempt kept in the final result for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub number: u32,
    pub tier: String,
    pub finish_reason: FinishReason,
    pub classification: Classification,
    pub completeness: Completeness,
    pub output_units: usize,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub estimated_cost: f64,
    pub elapsed_ms: u64,
}

/// The successful output of one task; owned by the caller from here on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub artifact: String,
    pub tier_used: String,
    pub attempts_made: u32,
    pub total_cost_estimate: f64,
    pub completeness: Completeness,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub attempts: Vec<AttemptSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acceptable_completeness() {
        assert!(Completeness::Complete.is_acceptable());
        assert!(Completeness::PossiblyIncomplete.is_acceptable());
        assert!(!Completeness::Truncated.is_acceptable());
        assert!(!Completeness::TooShort.is_acceptable());
    }

    #[test]
    fn empty_counts_as_non_artifact() {
        assert!(Classification::Empty.is_non_artifact());
        assert!(Classification::Conversational.is_non_artifact());
        assert!(!Classification::Artifact.is_non_artifact());
    }

    #[test]
    fn non_artifact_outcome_has_no_extraction() {
        let outcome = ValidationOutcome::non_artifact(Classification::Conversational, "prose");
        assert_eq!(outcome.completeness, Completeness::TooShort);
        assert!(outcome.extracted_artifact.is_none());
        assert_eq!(outcome.issues, vec!["prose".to_string()]);
    }

    #[test]
    fn truncation_hint_follows_finish_reason() {
        let attempt = Attempt {
            number: 1,
            tier: ModelTier::new("fast", "m", 10),
            accumulated_text: "<html>".into(),
            finish_reason: FinishReason::LengthLimited,
            started_at: Utc::now(),
            elapsed: Duration::from_millis(5),
            usage: None,
            stream_error: None,
        };
        assert!(attempt.truncation_hint());
        assert!(!attempt.is_empty());
    }

    #[test]
    fn completeness_serializes_snake_case() {
        let json = serde_json::to_string(&Completeness::PossiblyIncomplete).unwrap();
        assert_eq!(json, r#""possibly_incomplete""#);
    }
}
