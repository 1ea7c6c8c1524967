//! Configuration loading, validation, and management for docforge.
//!
//! Loads configuration from `~/.docforge/config.toml` (or the file named by
//! `DOCFORGE_CONFIG`) with environment variable overrides. Every empirical
//! threshold of the pipeline lives here rather than in code, so it can be
//! tuned against real provider output.

use docforge_core::{ArtifactGrammar, MergeMode, ModelTier, TierLadder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.docforge/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Full rewrite or anchored splice for modifications
    #[serde(default)]
    pub merge: MergeMode,

    /// Provider tiers, cheapest first
    #[serde(default = "default_tiers")]
    pub tiers: Vec<ModelTier>,

    /// Attempt cap and tier escalation
    #[serde(default)]
    pub escalation: EscalationConfig,

    /// Completeness thresholds
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Transient-failure retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Stream consumption settings
    #[serde(default)]
    pub stream: StreamConfig,

    /// Target document grammar overrides
    #[serde(default)]
    pub grammar: GrammarConfig,

    /// Reinforcement texts appended on retries
    #[serde(default)]
    pub directives: DirectiveConfig,

    /// Usage recording
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_tiers() -> Vec<ModelTier> {
    TierLadder::standard().iter().cloned().collect()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Total attempts per task, escalations and reinforced retries included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Prior artifacts longer than this start a modification on the top tier
    #[serde(default = "default_preescalate_prior_units")]
    pub preescalate_prior_units: usize,

    /// Attach reinforcement directives to retries
    #[serde(default = "default_true")]
    pub reinforce_on_retry: bool,
}

fn default_max_attempts() -> u32 {
    2
}
fn default_preescalate_prior_units() -> usize {
    25_000
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            preescalate_prior_units: default_preescalate_prior_units(),
            reinforce_on_retry: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Shorter artifacts are rejected as `TooShort`
    #[serde(default = "default_min_artifact_units")]
    pub min_artifact_units: usize,

    /// Prior artifacts longer than this get the modification ratio checks
    #[serde(default = "default_large_document_units")]
    pub large_document_units: usize,

    /// Below this output/prior ratio a modification is `Truncated`
    #[serde(default = "default_truncated_ratio")]
    pub truncated_ratio: f64,

    /// Below this ratio (and above `truncated_ratio`) it is `PossiblyIncomplete`
    #[serde(default = "default_complete_ratio")]
    pub complete_ratio: f64,
}

fn default_min_artifact_units() -> usize {
    100
}
fn default_large_document_units() -> usize {
    10_000
}
fn default_truncated_ratio() -> f64 {
    0.3
}
fn default_complete_ratio() -> f64 {
    0.7
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_artifact_units: default_min_artifact_units(),
            large_document_units: default_large_document_units(),
            truncated_ratio: default_truncated_ratio(),
            complete_ratio: default_complete_ratio(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Same-tier retries after overload or transport failures
    #[serde(default = "default_max_transient_retries")]
    pub max_transient_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_transient_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    250
}
fn default_max_delay_ms() -> u64 {
    4_000
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_transient_retries: default_max_transient_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Longest wait for the next delta before the stream counts as broken
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_idle_timeout_secs() -> u64 {
    120
}

impl StreamConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

/// Overrides on top of the built-in HTML grammar. Unset fields keep the default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrammarConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_markers: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_markers: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fence_tokens: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hedging_phrases: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiters: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hedging_window: Option<usize>,
}

impl GrammarConfig {
    /// Resolve the overrides against the HTML grammar.
    pub fn to_grammar(&self) -> ArtifactGrammar {
        let base = ArtifactGrammar::html();
        ArtifactGrammar {
            start_markers: self.start_markers.clone().unwrap_or(base.start_markers),
            end_markers: self.end_markers.clone().unwrap_or(base.end_markers),
            fence_tokens: self.fence_tokens.clone().unwrap_or(base.fence_tokens),
            hedging_phrases: self.hedging_phrases.clone().unwrap_or(base.hedging_phrases),
            delimiters: self.delimiters.clone().unwrap_or(base.delimiters),
            hedging_window: self.hedging_window.unwrap_or(base.hedging_window),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveConfig {
    /// Sent after a truncated attempt
    #[serde(default = "default_complete_artifact_directive")]
    pub complete_artifact: String,

    /// Sent after a conversational or too-short reply
    #[serde(default = "default_artifact_only_directive")]
    pub artifact_only: String,
}

fn default_complete_artifact_directive() -> String {
    "Return the complete document from start to end. Do not abbreviate, elide, or stop early."
        .into()
}
fn default_artifact_only_directive() -> String {
    "Reply with the document only. Do not ask questions, apologize, or describe the changes."
        .into()
}

impl Default for DirectiveConfig {
    fn default() -> Self {
        Self {
            complete_artifact: default_complete_artifact_directive(),
            artifact_only: default_artifact_only_directive(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether usage records are collected at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Append usage records as JSON lines to this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_path: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            export_path: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from `DOCFORGE_CONFIG` or the default path
    /// (`~/.docforge/config.toml`), then apply environment overrides:
    /// - `DOCFORGE_MAX_ATTEMPTS`
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("DOCFORGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(raw) = lookup("DOCFORGE_MAX_ATTEMPTS") {
            self.escalation.max_attempts = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "DOCFORGE_MAX_ATTEMPTS must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".docforge")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tiers.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one tier must be configured".into(),
            ));
        }

        for (i, tier) in self.tiers.iter().enumerate() {
            if self.tiers[..i].iter().any(|t| t.id == tier.id) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate tier id '{}'",
                    tier.id
                )));
            }
            if tier.max_output_tokens == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "tier '{}' must allow at least one output token",
                    tier.id
                )));
            }
        }

        if self.escalation.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "escalation.max_attempts must be at least 1".into(),
            ));
        }

        let v = &self.validation;
        let in_unit = |r: f64| (0.0..=1.0).contains(&r);
        if !in_unit(v.truncated_ratio) || !in_unit(v.complete_ratio) {
            return Err(ConfigError::ValidationError(
                "validation ratios must be between 0.0 and 1.0".into(),
            ));
        }
        if v.truncated_ratio > v.complete_ratio {
            return Err(ConfigError::ValidationError(
                "validation.truncated_ratio must not exceed validation.complete_ratio".into(),
            ));
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }

        let grammar = self.grammar.to_grammar();
        if grammar.start_markers.is_empty() || grammar.end_markers.is_empty() {
            return Err(ConfigError::ValidationError(
                "grammar needs at least one start marker and one end marker".into(),
            ));
        }

        Ok(())
    }

    /// The configured tiers as an ordered ladder.
    pub fn ladder(&self) -> TierLadder {
        TierLadder::new(self.tiers.clone())
    }

    /// The resolved document grammar.
    pub fn grammar(&self) -> ArtifactGrammar {
        self.grammar.to_grammar()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            merge: MergeMode::default(),
            tiers: default_tiers(),
            escalation: EscalationConfig::default(),
            validation: ValidationConfig::default(),
            retry: RetryConfig::default(),
            stream: StreamConfig::default(),
            grammar: GrammarConfig::default(),
            directives: DirectiveConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
