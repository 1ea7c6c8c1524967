//! `docforge batch`: run a manifest of tasks concurrently.
//!
//! Every task gets its own replay provider and controller; all of them share
//! one usage sink. Entries that reuse a task id are serialized through
//! [`TaskLocks`] so the same task never has two generations in flight.
//!
//! ```toml
//! [[task]]
//! id = "landing"
//! instruction = "A landing page for a bakery"
//! recordings = { fast = "replies/landing-fast.txt", capable = "replies/landing.txt" }
//!
//! [[task]]
//! id = "landing"
//! instruction = "Make the header green"
//! prior = "pages/landing.html"
//! recordings = { capable = "replies/landing-green.jsonl" }
//! ```
//!
//! Relative paths resolve against the manifest's directory.

use docforge_config::PipelineConfig;
use docforge_core::{
    ArtifactMetadata, ArtifactStore, GenerationError, GenerationResult, GenerationTask, TaskId,
    TelemetrySink,
};
use docforge_pipeline::{EscalationController, TaskLocks};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{UsageRecorder, cancel_on_ctrl_c, load_config, print_usage, replay_provider};
use crate::store::FileArtifactStore;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Manifest {0} lists no tasks")]
    Empty(PathBuf),
}

#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default, rename = "task")]
    pub tasks: Vec<ManifestTask>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestTask {
    #[serde(default)]
    pub id: Option<String>,
    pub instruction: String,
    #[serde(default)]
    pub prior: Option<PathBuf>,
    #[serde(default)]
    pub context: Option<PathBuf>,
    /// Tier id to recording path
    pub recordings: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub length_limited: bool,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: Self = toml::from_str(&content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if manifest.tasks.is_empty() {
            return Err(ManifestError::Empty(path.to_path_buf()));
        }
        Ok(manifest)
    }
}

impl ManifestTask {
    fn build(&self, base: &Path) -> std::io::Result<GenerationTask> {
        let mut task = match &self.prior {
            Some(prior) => {
                GenerationTask::modify(&self.instruction, std::fs::read_to_string(base.join(prior))?)
            }
            None => GenerationTask::generate(&self.instruction),
        };
        if let Some(id) = &self.id {
            task = task.with_id(TaskId::from(id));
        }
        if let Some(context) = &self.context {
            task = task.with_context(std::fs::read_to_string(base.join(context))?);
        }
        Ok(task)
    }

    fn recordings(&self, base: &Path) -> Vec<(String, PathBuf)> {
        self.recordings
            .iter()
            .map(|(tier, path)| (tier.clone(), base.join(path)))
            .collect()
    }
}

/// How one manifest entry ended.
#[derive(Debug)]
enum EntryOutcome {
    Saved(GenerationResult),
    Failed(GenerationError),
    /// Setup or persistence problem outside the pipeline
    Broken(String),
}

/// Shared state every entry borrows.
struct BatchContext<'a> {
    config: &'a PipelineConfig,
    base: &'a Path,
    sink: Option<Arc<dyn TelemetrySink>>,
    locks: &'a TaskLocks,
    store: &'a FileArtifactStore,
    cancel: &'a CancellationToken,
}

pub async fn run(
    config_path: Option<&Path>,
    manifest_path: &Path,
    concurrency: usize,
    out: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let manifest = Manifest::load(manifest_path)?;
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let usage = UsageRecorder::from_config(&config.telemetry);
    let locks = TaskLocks::new();
    let store = FileArtifactStore::new(out);
    let cancel = cancel_on_ctrl_c();
    let ctx = BatchContext {
        config: &config,
        base,
        sink: usage.sink(),
        locks: &locks,
        store: &store,
        cancel: &cancel,
    };

    info!(
        tasks = manifest.tasks.len(),
        concurrency = concurrency.max(1),
        "Starting batch"
    );

    let total = manifest.tasks.len();
    let outcomes: Vec<(String, EntryOutcome)> = stream::iter(manifest.tasks.iter().enumerate())
        .map(|(idx, entry)| {
            let ctx = &ctx;
            async move { run_entry(idx, entry, ctx).await }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    drop(ctx);

    let mut failed = 0;
    println!("📦 Batch results");
    println!("─────────────────────────────────────────────────────");
    for (label, outcome) in &outcomes {
        match outcome {
            EntryOutcome::Saved(result) => println!(
                "  ✅ {label:<24} {:<10} attempts={} {} ${:.6}",
                result.tier_used,
                result.attempts_made,
                result.completeness,
                result.total_cost_estimate
            ),
            EntryOutcome::Failed(err) => {
                failed += 1;
                println!("  ❌ {label:<24} {}: {}", err.kind, err.message);
            }
            EntryOutcome::Broken(reason) => {
                failed += 1;
                println!("  ⛔ {label:<24} {reason}");
            }
        }
    }
    println!();
    print_usage(&usage.finish().await);

    if failed > 0 {
        return Err(format!("{failed} of {total} tasks failed").into());
    }
    Ok(())
}

async fn run_entry(
    idx: usize,
    entry: &ManifestTask,
    ctx: &BatchContext<'_>,
) -> (String, EntryOutcome) {
    let task = match entry.build(ctx.base) {
        Ok(task) => task,
        Err(e) => {
            let label = entry.id.clone().unwrap_or_else(|| format!("#{}", idx + 1));
            let reason = format!("cannot read task inputs: {e}");
            return (label, EntryOutcome::Broken(reason));
        }
    };
    let label = task.id.to_string();

    let recordings = entry.recordings(ctx.base);
    let provider = match replay_provider(&recordings, entry.length_limited, &ctx.config.ladder()) {
        Ok(provider) => provider,
        Err(e) => return (label, EntryOutcome::Broken(e.to_string())),
    };

    if ctx.locks.is_busy(&task.id) {
        debug!(task_id = %task.id, "Waiting for earlier generation of the same task");
    }
    let _guard = ctx.locks.acquire(&task.id).await;

    let mut controller = EscalationController::new(Arc::new(provider), ctx.config);
    if let Some(sink) = &ctx.sink {
        controller = controller.with_sink(Arc::clone(sink));
    }

    let result = match controller.generate_with_cancel(&task, ctx.cancel).await {
        Ok(result) => result,
        Err(err) => {
            warn!(task_id = %task.id, kind = %err.kind, "Batch entry failed");
            return (label, EntryOutcome::Failed(err));
        }
    };

    let metadata = ArtifactMetadata::from_result(&task.id, &result);
    match ctx.store.save(&result.artifact, &metadata).await {
        Ok(()) => (label, EntryOutcome::Saved(result)),
        Err(e) => (label, EntryOutcome::Broken(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(title: &str) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head><title>{title}</title></head>\n<body>\n{}</body>\n</html>",
            "<p>Fresh bread every morning, baked on site.</p>\n".repeat(5)
        )
    }

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn manifest_parses_tasks_and_recordings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.toml");
        write(
            dir.path(),
            "batch.toml",
            r#"
[[task]]
id = "home"
instruction = "A home page"
recordings = { fast = "home.txt" }

[[task]]
instruction = "An about page"
length_limited = true
recordings = { fast = "about-fast.txt", capable = "about.jsonl" }
"#,
        );

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.tasks.len(), 2);
        assert_eq!(manifest.tasks[0].id.as_deref(), Some("home"));
        assert!(manifest.tasks[1].length_limited);

        let recordings = manifest.tasks[1].recordings(dir.path());
        assert_eq!(recordings[0].0, "capable");
        assert_eq!(recordings[0].1, dir.path().join("about.jsonl"));
    }

    #[test]
    fn manifest_without_tasks_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "empty.toml", "# nothing here\n");
        assert!(matches!(
            Manifest::load(&dir.path().join("empty.toml")),
            Err(ManifestError::Empty(_))
        ));
    }

    #[test]
    fn missing_prior_fails_to_build() {
        let entry = ManifestTask {
            id: Some("x".into()),
            instruction: "edit".into(),
            prior: Some(PathBuf::from("missing.html")),
            context: None,
            recordings: BTreeMap::new(),
            length_limited: false,
        };
        assert!(entry.build(Path::new("/nonexistent")).is_err());
    }

    #[tokio::test]
    async fn batch_saves_successes_only() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        write(dir.path(), "home.txt", &page("Home"));
        write(dir.path(), "home-v2.txt", &page("Home v2"));
        write(dir.path(), "chat.txt", "Could you tell me more about what you'd like?");
        write(
            dir.path(),
            "batch.toml",
            r#"
[[task]]
id = "home"
instruction = "A home page"
recordings = { fast = "home.txt" }

[[task]]
id = "home"
instruction = "A second home page"
recordings = { fast = "home-v2.txt" }

[[task]]
id = "vague"
instruction = "Something nice"
recordings = { fast = "chat.txt" }
"#,
        );

        let result = run(
            Some(&dir.path().join("no-config.toml")),
            &dir.path().join("batch.toml"),
            3,
            &out,
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("1 of 3"));

        let store = FileArtifactStore::new(&out);
        let home = std::fs::read_to_string(store.artifact_path("home")).unwrap();
        assert!(home.contains("<title>Home"));
        assert!(store.metadata_path("home").exists());
        assert!(!store.artifact_path("vague").exists());
        assert!(!store.metadata_path("vague").exists());
    }
}
