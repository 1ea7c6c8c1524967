//! Directory-backed artifact store.
//!
//! Each task becomes two files: `<task_id>.<ext>` with the artifact and
//! `<task_id>.meta.json` with its metadata. Both are written to a temporary
//! name first and renamed into place.

use async_trait::async_trait;
use docforge_core::{ArtifactMetadata, ArtifactStore};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
    extension: String,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: "html".into(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn artifact_path(&self, task_id: &str) -> PathBuf {
        self.dir.join(format!("{task_id}.{}", self.extension))
    }

    pub fn metadata_path(&self, task_id: &str) -> PathBuf {
        self.dir.join(format!("{task_id}.meta.json"))
    }
}

async fn write_replacing(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let io = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let temp = path.with_extension("tmp");
    tokio::fs::write(&temp, contents).await.map_err(io)?;
    tokio::fs::rename(&temp, path).await.map_err(io)
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    type Error = StoreError;

    async fn save(&self, artifact: &str, metadata: &ArtifactMetadata) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let task_id = metadata.task_id.to_string();
        let meta = serde_json::to_vec_pretty(metadata)?;

        // Artifact first: metadata on disk implies the artifact is complete
        write_replacing(&self.artifact_path(&task_id), artifact.as_bytes()).await?;
        write_replacing(&self.metadata_path(&task_id), &meta).await?;

        tracing::debug!(task_id = %task_id, dir = %self.dir.display(), "Artifact saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docforge_core::{Completeness, TaskId};

    fn metadata(id: &str) -> ArtifactMetadata {
        ArtifactMetadata {
            task_id: TaskId::from(id),
            tier_used: "fast".into(),
            attempts_made: 1,
            completeness: Completeness::Complete,
            total_cost_estimate: 0.001,
            warnings: vec![],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_writes_artifact_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path().join("nested"));

        store
            .save("<html></html>", &metadata("page-1"))
            .await
            .unwrap();

        let artifact = std::fs::read_to_string(store.artifact_path("page-1")).unwrap();
        assert_eq!(artifact, "<html></html>");

        let meta: ArtifactMetadata =
            serde_json::from_str(&std::fs::read_to_string(store.metadata_path("page-1")).unwrap())
                .unwrap();
        assert_eq!(meta.tier_used, "fast");
        assert!(!store.artifact_path("page-1").with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn save_overwrites_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path()).with_extension("xml");

        store.save("<a/>", &metadata("doc")).await.unwrap();
        store.save("<b/>", &metadata("doc")).await.unwrap();

        assert!(store.artifact_path("doc").ends_with("doc.xml"));
        assert_eq!(
            std::fs::read_to_string(store.artifact_path("doc")).unwrap(),
            "<b/>"
        );
    }
}
