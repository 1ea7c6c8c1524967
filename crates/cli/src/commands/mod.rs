//! Subcommand handlers and the setup they share.

pub mod batch;
pub mod config_cmd;
pub mod generate;
pub mod inspect;
pub mod tiers;

use docforge_config::{ConfigError, PipelineConfig, TelemetryConfig};
use docforge_core::{GenerationError, TelemetrySink, TierLadder};
use docforge_providers::{Recording, ReplayProvider};
use docforge_telemetry::{TelemetryEngine, UsageSnapshot, spawn_jsonl_exporter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Load the explicit config file if one was given, otherwise the default location.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    match path {
        Some(path) => {
            let mut config = PipelineConfig::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok())?;
            Ok(config)
        }
        None => PipelineConfig::load(),
    }
}

/// Parse a `TIER=PATH` argument.
pub fn parse_recording(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((tier, path)) if !tier.trim().is_empty() && !path.trim().is_empty() => {
            Ok((tier.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(format!("expected TIER=PATH, got '{raw}'")),
    }
}

/// Build a replay provider with one recording per tier.
pub fn replay_provider(
    recordings: &[(String, PathBuf)],
    length_limited: bool,
    ladder: &TierLadder,
) -> Result<ReplayProvider, Box<dyn std::error::Error>> {
    let mut provider = ReplayProvider::new();
    for (tier, path) in recordings {
        if ladder.rank_of(tier).is_none() {
            warn!(tier = %tier, "Recording given for a tier that is not configured");
        }
        provider = provider.with_recording(tier.clone(), Recording::load(path, length_limited)?);
    }
    Ok(provider)
}

/// A cancellation token that fires on Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            trigger.cancel();
        }
    });
    token
}

/// The usage sink for one CLI run, plus its optional JSON-lines exporter.
pub struct UsageRecorder {
    engine: Option<Arc<TelemetryEngine>>,
    exporter: Option<JoinHandle<std::io::Result<usize>>>,
}

impl UsageRecorder {
    pub fn from_config(config: &TelemetryConfig) -> Self {
        if !config.enabled {
            return Self {
                engine: None,
                exporter: None,
            };
        }
        match &config.export_path {
            Some(path) => {
                let (engine, rx) = TelemetryEngine::with_export();
                Self {
                    engine: Some(Arc::new(engine)),
                    exporter: Some(spawn_jsonl_exporter(rx, PathBuf::from(path))),
                }
            }
            None => Self {
                engine: Some(Arc::new(TelemetryEngine::new())),
                exporter: None,
            },
        }
    }

    pub fn sink(&self) -> Option<Arc<dyn TelemetrySink>> {
        self.engine
            .as_ref()
            .map(|engine| Arc::clone(engine) as Arc<dyn TelemetrySink>)
    }

    /// Take the final totals and wait for the exporter to drain.
    ///
    /// Every controller holding the sink must be dropped first, otherwise
    /// the exporter never sees its channel close.
    pub async fn finish(self) -> UsageSnapshot {
        let snapshot = self
            .engine
            .as_ref()
            .map(|engine| engine.snapshot())
            .unwrap_or_default();
        drop(self.engine);

        if let Some(exporter) = self.exporter {
            match exporter.await {
                Ok(Ok(written)) => tracing::debug!(written, "Usage records exported"),
                Ok(Err(e)) => warn!(error = %e, "Usage export failed"),
                Err(e) => warn!(error = %e, "Usage exporter panicked"),
            }
        }
        snapshot
    }
}

pub fn print_usage(snapshot: &UsageSnapshot) {
    println!("📊 Usage");
    println!("  Records:        {}", snapshot.records);
    println!("  Input tokens:   {}", snapshot.input_tokens);
    println!("  Output tokens:  {}", snapshot.output_tokens);
    println!("  Retried:        {}", snapshot.retried_attempts);
    println!("  Estimated cost: ${:.6}", snapshot.total_cost_usd);
}

pub fn print_failure(task_id: &str, err: &GenerationError) {
    println!("❌ {task_id}: {}", err.kind);
    println!("   {}", err.message);
    if let Some(wait) = err.retry_after {
        println!("   Retry after {}s", wait.as_secs());
    }
    if let Some(outcome) = &err.last_outcome {
        println!(
            "   Last attempt: {} / {}",
            outcome.classification, outcome.completeness
        );
        for issue in &outcome.issues {
            println!("   ⚠️  {issue}");
        }
    }
    println!("   Attempts made: {}", err.attempts_made);
}

#[cfg(test)]
mod tests {
    use super::*;
    use docforge_core::ModelTier;

    #[test]
    fn recording_argument_splits_on_first_equals() {
        let (tier, path) = parse_recording("capable=replies/a=b.txt").unwrap();
        assert_eq!(tier, "capable");
        assert_eq!(path, PathBuf::from("replies/a=b.txt"));
    }

    #[test]
    fn recording_argument_needs_both_halves() {
        assert!(parse_recording("fast").is_err());
        assert!(parse_recording("=reply.txt").is_err());
        assert!(parse_recording("fast=").is_err());
    }

    #[test]
    fn replay_provider_loads_each_recording() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fast.txt");
        std::fs::write(&path, "<html></html>").unwrap();

        let ladder = TierLadder::new(vec![ModelTier::new("fast", "m", 100)]);
        let provider = replay_provider(&[("fast".into(), path)], false, &ladder).unwrap();
        assert_eq!(provider.tiers().collect::<Vec<_>>(), vec!["fast"]);
    }

    #[test]
    fn missing_recording_is_an_error() {
        let ladder = TierLadder::standard();
        let missing = vec![("fast".to_string(), PathBuf::from("/nonexistent/reply.txt"))];
        assert!(replay_provider(&missing, false, &ladder).is_err());
    }

    #[tokio::test]
    async fn disabled_telemetry_has_no_sink() {
        let recorder = UsageRecorder::from_config(&TelemetryConfig {
            enabled: false,
            export_path: None,
        });
        assert!(recorder.sink().is_none());
        assert_eq!(recorder.finish().await, UsageSnapshot::default());
    }

    #[tokio::test]
    async fn exporter_drains_after_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.jsonl");
        let recorder = UsageRecorder::from_config(&TelemetryConfig {
            enabled: true,
            export_path: Some(path.display().to_string()),
        });

        let sink = recorder.sink().unwrap();
        sink.record(docforge_core::UsageRecord {
            task_id: "t".into(),
            tier: "fast".into(),
            attempt: 1,
            input_tokens: 10,
            output_tokens: 20,
            estimated_cost: 0.0,
            recorded_at: chrono::Utc::now(),
        });
        drop(sink);

        let snapshot = recorder.finish().await;
        assert_eq!(snapshot.records, 1);
        assert_eq!(snapshot.total_tokens(), 30);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }
}
