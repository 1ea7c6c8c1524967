//! Generation task: the immutable input of one pipeline run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a generation task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether the task produces a fresh artifact or rewrites an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Generate,
    Modify,
}

/// An image (or other binary) attachment forwarded to the provider untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// MIME type, e.g. `image/png`
    pub media_type: String,

    /// Base64-encoded payload
    pub data: String,
}

/// One user action: an instruction plus whatever the provider needs to act on it.
///
/// Immutable once built; the controller only ever borrows it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationTask {
    pub id: TaskId,

    /// Opaque instruction payload (prompt templates are built upstream)
    pub instruction: String,

    /// The artifact being modified (required in practice for `Modify`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_artifact: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,

    pub mode: GenerationMode,

    /// Earlier conversation turns, already rendered by the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_context: Option<String>,
}

impl GenerationTask {
    /// A task that asks for a brand new artifact.
    pub fn generate(instruction: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            instruction: instruction.into(),
            prior_artifact: None,
            attachment: None,
            mode: GenerationMode::Generate,
            conversation_context: None,
        }
    }

    /// A task that rewrites `prior_artifact` according to the instruction.
    pub fn modify(instruction: impl Into<String>, prior_artifact: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            instruction: instruction.into(),
            prior_artifact: Some(prior_artifact.into()),
            attachment: None,
            mode: GenerationMode::Modify,
            conversation_context: None,
        }
    }

    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.conversation_context = Some(context.into());
        self
    }

    /// Length of the prior artifact in units, or 0 when there is none.
    pub fn prior_units(&self) -> usize {
        self.prior_artifact.as_deref().map(units).unwrap_or(0)
    }
}

/// Size of a text in "units": Unicode scalar values.
///
/// All artifact-length thresholds (minimum size, large-document cutoffs,
/// modification ratios) are expressed in these units.
pub fn units(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_task_has_no_prior() {
        let task = GenerationTask::generate("make a landing page");
        assert_eq!(task.mode, GenerationMode::Generate);
        assert!(task.prior_artifact.is_none());
        assert_eq!(task.prior_units(), 0);
    }

    #[test]
    fn modify_task_counts_prior_units() {
        let task = GenerationTask::modify("make it blue", "<html>é</html>");
        assert_eq!(task.mode, GenerationMode::Modify);
        assert_eq!(task.prior_units(), 14);
    }

    #[test]
    fn units_counts_chars_not_bytes() {
        assert_eq!(units("héllo"), 5);
        assert_eq!(units(""), 0);
    }

    #[test]
    fn task_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
        assert_eq!(TaskId::from("abc").to_string(), "abc");
    }

    #[test]
    fn task_serialization_skips_empty_fields() {
        let task = GenerationTask::generate("hi").with_id(TaskId::from("t1"));
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains(r#""mode":"generate""#));
        assert!(!json.contains("prior_artifact"));
    }
}
