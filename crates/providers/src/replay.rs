//! Recorded replies loaded from disk.
//!
//! Two formats are understood:
//! - `.jsonl`: one serialized [`StreamChunk`] per line, replayed verbatim
//! - anything else: plain text, split into fixed-size deltas and finished
//!   with a natural stop (or a length limit, when asked)

use async_trait::async_trait;
use docforge_core::{
    FinishReason, ModelTier, ProviderClient, ProviderError, ProviderRequest, StreamChunk,
    StreamReceiver,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::scripted::{Script, ScriptStep, play};

/// Characters per delta when streaming a plain-text recording.
const TEXT_DELTA_CHARS: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Failed to read recording {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid chunk at {path}:{line}: {reason}")]
    InvalidChunk {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// A recorded reply, ready to be turned into a [`Script`].
#[derive(Debug, Clone)]
pub struct Recording {
    chunks: Vec<StreamChunk>,
}

impl Recording {
    /// Build a recording from plain text.
    pub fn from_text(text: &str, finish: FinishReason) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let mut chunks: Vec<StreamChunk> = chars
            .chunks(TEXT_DELTA_CHARS)
            .map(|part| StreamChunk::delta(part.iter().collect::<String>()))
            .collect();
        chunks.push(StreamChunk::finished(finish, None));
        Self { chunks }
    }

    /// Parse a JSON-lines recording. Blank lines are skipped.
    pub fn from_jsonl(source: &str, path: &Path) -> Result<Self, ReplayError> {
        let mut chunks = Vec::new();
        for (idx, line) in source.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let chunk: StreamChunk =
                serde_json::from_str(line).map_err(|e| ReplayError::InvalidChunk {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    reason: e.to_string(),
                })?;
            chunks.push(chunk);
        }
        Ok(Self { chunks })
    }

    /// Load a recording from disk, picking the format by extension.
    pub fn load(path: &Path, length_limited: bool) -> Result<Self, ReplayError> {
        let source = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_jsonl = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));
        if is_jsonl {
            Self::from_jsonl(&source, path)
        } else {
            let finish = if length_limited {
                FinishReason::LengthLimited
            } else {
                FinishReason::NaturalStop
            };
            Ok(Self::from_text(&source, finish))
        }
    }

    pub fn chunks(&self) -> &[StreamChunk] {
        &self.chunks
    }

    /// Convert into a playable script.
    ///
    /// A recording that never reaches a terminal chunk ends in a broken
    /// stream, the same way a dropped connection would look.
    pub fn into_script(self) -> Script {
        let mut steps = Vec::with_capacity(self.chunks.len() + 1);
        let mut finished = false;
        for chunk in self.chunks {
            if let Some(text) = chunk.content {
                if !text.is_empty() {
                    steps.push(ScriptStep::Delta(text));
                }
            }
            if chunk.done {
                let reason = chunk.finish_reason.unwrap_or(FinishReason::NaturalStop);
                steps.push(ScriptStep::Finish(reason, chunk.usage));
                finished = true;
                break;
            }
        }
        if !finished {
            steps.push(ScriptStep::Fail(ProviderError::StreamInterrupted(
                "recording ended without a final chunk".into(),
            )));
        }
        Script::Stream(steps)
    }
}

/// A provider that answers every request on a tier with that tier's recording.
///
/// Unlike [`ScriptedProvider`](crate::ScriptedProvider) the recordings are not
/// consumed, so retries on the same tier see the same reply again.
#[derive(Default)]
pub struct ReplayProvider {
    recordings: HashMap<String, Recording>,
    closed_early: Arc<AtomicUsize>,
}

impl ReplayProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recording(mut self, tier: impl Into<String>, recording: Recording) -> Self {
        self.recordings.insert(tier.into(), recording);
        self
    }

    /// Tiers that have a recording.
    pub fn tiers(&self) -> impl Iterator<Item = &str> {
        self.recordings.keys().map(String::as_str)
    }
}

#[async_trait]
impl ProviderClient for ReplayProvider {
    fn name(&self) -> &str {
        "replay"
    }

    async fn submit(
        &self,
        tier: &ModelTier,
        request: ProviderRequest,
    ) -> Result<StreamReceiver, ProviderError> {
        let recording = self.recordings.get(&tier.id).ok_or_else(|| {
            ProviderError::NotConfigured(format!("no recording for tier '{}'", tier.id))
        })?;
        debug!(
            tier = %tier.id,
            chunks = recording.chunks.len(),
            request_chars = request.payload_chars(),
            "Replaying recorded reply"
        );

        let Script::Stream(steps) = recording.clone().into_script() else {
            return Err(ProviderError::NotConfigured(format!(
                "recording for tier '{}' is not a stream",
                tier.id
            )));
        };
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(play(steps, tx, Arc::clone(&self.closed_early)));
        Ok(rx)
    }
}
