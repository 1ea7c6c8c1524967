//! Completeness checks on an extracted artifact.

use docforge_config::ValidationConfig;
use docforge_core::{ArtifactGrammar, Completeness, FinishReason, GenerationMode, units};

/// The validator's verdict on one artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub completeness: Completeness,
    pub issues: Vec<String>,
    /// Artifact length over prior length, in modify mode only
    pub ratio: Option<f64>,
}

impl Verdict {
    fn new(completeness: Completeness, ratio: Option<f64>) -> Self {
        Self {
            completeness,
            issues: Vec::new(),
            ratio,
        }
    }

    fn issue(mut self, issue: impl Into<String>) -> Self {
        self.issues.push(issue.into());
        self
    }
}

/// Judges size and structure of an extracted artifact.
///
/// Checks run in a fixed order and the first one that fails decides:
/// 1. too short or no structural syntax
/// 2. modify mode: provider hit its length limit, or a large prior shrank below `truncated_ratio`
/// 3. no end marker
/// 4. large prior between `truncated_ratio` and `complete_ratio`
#[derive(Debug, Clone)]
pub struct CompletenessValidator {
    grammar: ArtifactGrammar,
    config: ValidationConfig,
}

impl CompletenessValidator {
    pub fn new(grammar: ArtifactGrammar, config: ValidationConfig) -> Self {
        Self { grammar, config }
    }

    pub fn validate(
        &self,
        artifact: &str,
        mode: GenerationMode,
        prior_artifact: Option<&str>,
        finish_reason: FinishReason,
    ) -> Verdict {
        let len = units(artifact);

        if artifact.trim().is_empty() {
            return Verdict::new(Completeness::TooShort, None).issue("artifact is empty");
        }
        if len < self.config.min_artifact_units {
            return Verdict::new(Completeness::TooShort, None).issue(format!(
                "artifact has {len} characters, minimum is {}",
                self.config.min_artifact_units
            ));
        }
        if !self.grammar.has_structural_syntax(artifact) {
            return Verdict::new(Completeness::TooShort, None)
                .issue("artifact contains no structural syntax");
        }

        let prior_len = match (mode, prior_artifact) {
            (GenerationMode::Modify, Some(prior)) => Some(units(prior)).filter(|&l| l > 0),
            _ => None,
        };
        let ratio = prior_len.map(|prior| len as f64 / prior as f64);
        let large_prior = prior_len.is_some_and(|prior| prior > self.config.large_document_units);

        if finish_reason == FinishReason::LengthLimited {
            return Verdict::new(Completeness::Truncated, ratio)
                .issue("provider stopped at its output limit");
        }
        if let Some(ratio) = ratio.filter(|_| large_prior) {
            if ratio < self.config.truncated_ratio {
                return Verdict::new(Completeness::Truncated, Some(ratio)).issue(format!(
                    "artifact is {:.0}% of the prior document",
                    ratio * 100.0
                ));
            }
        }

        if !self.grammar.has_end_marker(artifact) {
            return Verdict::new(Completeness::Truncated, ratio).issue("artifact has no end marker");
        }

        if let Some(ratio) = ratio.filter(|_| large_prior) {
            if ratio < self.config.complete_ratio {
                return Verdict::new(Completeness::PossiblyIncomplete, Some(ratio)).issue(format!(
                    "artifact is only {:.0}% of the prior document; some content may be missing",
                    ratio * 100.0
                ));
            }
        }

        Verdict::new(Completeness::Complete, ratio)
    }
}
