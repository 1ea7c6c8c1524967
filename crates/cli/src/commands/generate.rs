//! `docforge generate`: run one task through the escalation controller.
//!
//! Provider replies come from recordings, one per tier. The artifact is
//! persisted only when the controller returns successfully.

use clap::Args;
use docforge_core::{ArtifactMetadata, ArtifactStore, EventBus, GenerationTask, TaskId};
use docforge_pipeline::EscalationController;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::{
    UsageRecorder, cancel_on_ctrl_c, load_config, parse_recording, print_failure, print_usage,
    replay_provider,
};
use crate::store::FileArtifactStore;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Instruction forwarded to the provider
    pub instruction: String,

    /// Existing artifact to modify; switches the task to modify mode
    #[arg(short, long)]
    pub prior: Option<PathBuf>,

    /// Earlier conversation turns, already rendered
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Recorded reply for a tier, as TIER=PATH (repeatable)
    #[arg(short, long = "recording", value_parser = parse_recording, required = true)]
    pub recordings: Vec<(String, PathBuf)>,

    /// Plain-text recordings end at the output limit instead of a natural stop
    #[arg(long)]
    pub length_limited: bool,

    /// Task id; a random one is used when omitted
    #[arg(long)]
    pub task_id: Option<String>,

    /// Directory the artifact is written to
    #[arg(short, long, default_value = "out")]
    pub out: PathBuf,

    /// Print every controller event as a JSON line
    #[arg(long)]
    pub events: bool,
}

pub async fn run(
    config_path: Option<&Path>,
    args: GenerateArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let provider = replay_provider(&args.recordings, args.length_limited, &config.ladder())?;

    let mut task = match &args.prior {
        Some(path) => GenerationTask::modify(&args.instruction, std::fs::read_to_string(path)?),
        None => GenerationTask::generate(&args.instruction),
    };
    if let Some(id) = &args.task_id {
        task = task.with_id(TaskId::from(id));
    }
    if let Some(path) = &args.context {
        task = task.with_context(std::fs::read_to_string(path)?);
    }

    let usage = UsageRecorder::from_config(&config.telemetry);
    let bus = Arc::new(EventBus::default());
    let printer = args.events.then(|| spawn_event_printer(&bus));

    let mut controller =
        EscalationController::new(Arc::new(provider), &config).with_event_bus(Arc::clone(&bus));
    if let Some(sink) = usage.sink() {
        controller = controller.with_sink(sink);
    }

    let cancel = cancel_on_ctrl_c();
    let outcome = controller.generate_with_cancel(&task, &cancel).await;
    drop(controller);
    drop(bus);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            print_failure(&task.id.to_string(), &err);
            print_usage(&usage.finish().await);
            return Err(err.into());
        }
    };

    let store = FileArtifactStore::new(&args.out);
    store
        .save(&result.artifact, &ArtifactMetadata::from_result(&task.id, &result))
        .await?;
    info!(
        task_id = %task.id,
        path = %store.artifact_path(&task.id.to_string()).display(),
        "Artifact written"
    );

    println!("✅ {}", task.id);
    println!("   Tier:         {}", result.tier_used);
    println!("   Attempts:     {}", result.attempts_made);
    println!("   Completeness: {}", result.completeness);
    println!("   Cost:         ${:.6}", result.total_cost_estimate);
    println!(
        "   Written to:   {}",
        store.artifact_path(&task.id.to_string()).display()
    );
    for warning in &result.warnings {
        println!("   ⚠️  {warning}");
    }
    print_usage(&usage.finish().await);

    Ok(())
}

fn spawn_event_printer(bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Ok(line) = serde_json::to_string(event.as_ref()) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
