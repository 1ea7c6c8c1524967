//! Provider contract: the abstraction over streaming generative-text backends.
//!
//! A `ProviderClient` accepts a request for a given tier and answers with a
//! stream of text deltas, terminated by a chunk carrying the finish reason.
//! Transport (HTTP, auth, SSE parsing) lives outside this workspace.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::task::{Attachment, GenerationMode};
use crate::tier::ModelTier;

/// Why the provider stopped emitting text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model finished on its own
    NaturalStop,
    /// Output hit the tier's size ceiling
    LengthLimited,
    /// The stream broke off
    Error,
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NaturalStop => write!(f, "natural_stop"),
            Self::LengthLimited => write!(f, "length_limited"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content delta
    #[serde(default)]
    pub content: Option<String>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Set on the final chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn finished(reason: FinishReason, usage: Option<Usage>) -> Self {
        Self {
            content: None,
            done: true,
            finish_reason: Some(reason),
            usage,
        }
    }
}

/// The receiving half of a provider stream.
pub type StreamReceiver = mpsc::Receiver<Result<StreamChunk, ProviderError>>;

/// Extra instructions layered on top of the caller's instruction for a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Directive {
    /// "Return the complete artifact", sent after a truncated attempt
    CompleteArtifact,
    /// "Reply with the artifact only, no conversation", sent after a prose reply
    ArtifactOnly,
}

/// What shape of output the provider is asked for in modify mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// The whole rewritten artifact
    #[default]
    Full,
    /// Only the changed region, spliced into the prior artifact afterwards
    IncrementalAtAnchor,
}

/// Everything a provider needs to produce one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Provider model identifier (from the tier)
    pub model: String,

    /// Output ceiling for this attempt (from the tier)
    pub max_tokens: u32,

    pub mode: GenerationMode,

    pub instruction: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_artifact: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_context: Option<String>,

    /// Reinforcement texts, already rendered, in the order they were added
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<String>,

    #[serde(default)]
    pub merge: MergeMode,
}

impl ProviderRequest {
    /// Characters that will be sent to the provider, used for input cost estimates.
    pub fn payload_chars(&self) -> usize {
        self.instruction.len()
            + self.prior_artifact.as_ref().map_or(0, String::len)
            + self.conversation_context.as_ref().map_or(0, String::len)
            + self.directives.iter().map(String::len).sum::<usize>()
    }
}

/// The streaming provider contract consumed by the pipeline.
///
/// `submit` either fails up front (rate limit, overload, transport) or hands
/// back a channel of chunks. The channel may also carry an error in place of
/// a chunk when the stream breaks mid-way. Dropping the receiver closes the
/// underlying stream.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// A human-readable name for this provider.
    fn name(&self) -> &str;

    /// Start one streamed attempt on the given tier.
    async fn submit(
        &self,
        tier: &ModelTier,
        request: ProviderRequest,
    ) -> Result<StreamReceiver, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_and_finished_chunks() {
        let delta = StreamChunk::delta("<html>");
        assert_eq!(delta.content.as_deref(), Some("<html>"));
        assert!(!delta.done);

        let end = StreamChunk::finished(FinishReason::LengthLimited, None);
        assert!(end.done);
        assert_eq!(end.finish_reason, Some(FinishReason::LengthLimited));
    }

    #[test]
    fn finish_reason_serialization() {
        let json = serde_json::to_string(&FinishReason::LengthLimited).unwrap();
        assert_eq!(json, r#""length_limited""#);
        assert_eq!(FinishReason::NaturalStop.to_string(), "natural_stop");
    }

    #[test]
    fn payload_chars_sums_all_parts() {
        let req = ProviderRequest {
            model: "m".into(),
            max_tokens: 10,
            mode: GenerationMode::Modify,
            instruction: "abcd".into(),
            prior_artifact: Some("12345678".into()),
            attachment: None,
            conversation_context: Some("xy".into()),
            directives: vec!["zz".into()],
            merge: MergeMode::Full,
        };
        assert_eq!(req.payload_chars(), 16);
    }

    #[test]
    fn merge_mode_defaults_to_full() {
        assert_eq!(MergeMode::default(), MergeMode::Full);
        let json = serde_json::to_string(&MergeMode::IncrementalAtAnchor).unwrap();
        assert_eq!(json, r#""incremental_at_anchor""#);
    }
}
