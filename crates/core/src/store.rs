//! Persistence collaborator.
//!
//! The pipeline never calls this itself. Callers invoke `save` once
//! `generate()` returns successfully, so cancelled or failed tasks can never
//! leave a partial artifact behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::outcome::{Completeness, GenerationResult};
use crate::task::TaskId;

/// What gets stored next to an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub task_id: TaskId,
    pub tier_used: String,
    pub attempts_made: u32,
    pub completeness: Completeness,
    pub total_cost_estimate: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ArtifactMetadata {
    pub fn from_result(task_id: &TaskId, result: &GenerationResult) -> Self {
        Self {
            task_id: task_id.clone(),
            tier_used: result.tier_used.clone(),
            attempts_made: result.attempts_made,
            completeness: result.completeness,
            total_cost_estimate: result.total_cost_estimate,
            warnings: result.warnings.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Long-term storage for finished artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn save(&self, artifact: &str, metadata: &ArtifactMetadata) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_copies_result_fields() {
        let result = GenerationResult {
            artifact: "<html></html>".into(),
            tier_used: "capable".into(),
            attempts_made: 2,
            total_cost_estimate: 0.25,
            completeness: Completeness::PossiblyIncomplete,
            warnings: vec!["short".into()],
            attempts: vec![],
        };
        let meta = ArtifactMetadata::from_result(&TaskId::from("t9"), &result);
        assert_eq!(meta.task_id, TaskId::from("t9"));
        assert_eq!(meta.tier_used, "capable");
        assert_eq!(meta.attempts_made, 2);
        assert_eq!(meta.completeness, Completeness::PossiblyIncomplete);
        assert_eq!(meta.warnings.len(), 1);
    }
}
