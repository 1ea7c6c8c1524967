//! One reply in, one [`ValidationOutcome`] out.
//!
//! Chains classification, extraction, merging and validation. The controller
//! runs this after every attempt; the CLI runs it on captured replies.

use docforge_config::PipelineConfig;
use docforge_core::{
    ArtifactGrammar, Classification, FinishReason, GenerationMode, MergeMode, ValidationOutcome,
    units,
};
use tracing::debug;

use crate::classifier::ResponseClassifier;
use crate::extractor::ArtifactExtractor;
use crate::merge::MergeStrategy;
use crate::validator::CompletenessValidator;

/// What a reply is being judged against.
#[derive(Debug, Clone, Copy)]
pub struct AssessContext<'a> {
    pub mode: GenerationMode,
    pub prior_artifact: Option<&'a str>,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone)]
pub struct Assessor {
    classifier: ResponseClassifier,
    extractor: ArtifactExtractor,
    validator: CompletenessValidator,
}

impl Assessor {
    pub fn new(grammar: ArtifactGrammar, config: &PipelineConfig) -> Self {
        Self {
            classifier: ResponseClassifier::new(grammar.clone()),
            extractor: ArtifactExtractor::new(grammar.clone()),
            validator: CompletenessValidator::new(grammar, config.validation.clone()),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.grammar(), config)
    }

    pub fn classifier(&self) -> &ResponseClassifier {
        &self.classifier
    }

    pub fn extractor(&self) -> &ArtifactExtractor {
        &self.extractor
    }

    pub fn assess(
        &self,
        text: &str,
        ctx: AssessContext<'_>,
        merge: &dyn MergeStrategy,
    ) -> ValidationOutcome {
        let classified = self.classifier.classify(text);
        let mut classification = classified.classification;
        let mut issues = Vec::new();

        let splice_target = match ctx.mode {
            GenerationMode::Modify => ctx.prior_artifact,
            GenerationMode::Generate => None,
        };

        let artifact = match (classification, splice_target) {
            (Classification::Artifact, None) => self.extractor.extract(text),
            (Classification::Artifact, Some(prior)) => {
                let extracted = self.extractor.extract(text);
                match merge.merge(prior, &extracted) {
                    Ok(merged) => merged,
                    Err(e) => {
                        issues.push(format!("merge refused: {e}"));
                        extracted
                    }
                }
            }
            // A fragment carries no start marker; it only counts once it splices in
            (_, Some(prior)) if merge.mode() != MergeMode::Full => {
                let fragment = self.extractor.extract(text);
                match merge.merge(prior, &fragment) {
                    Ok(merged) => {
                        debug!(units = units(&merged), "Fragment spliced into prior artifact");
                        classification = Classification::Artifact;
                        merged
                    }
                    Err(e) => {
                        return ValidationOutcome::non_artifact(
                            classification,
                            format!("{}; merge refused: {e}", classified.describe()),
                        );
                    }
                }
            }
            _ => {
                return ValidationOutcome::non_artifact(classification, classified.describe());
            }
        };

        let verdict = self.validator.validate(
            &artifact,
            ctx.mode,
            ctx.prior_artifact,
            ctx.finish_reason,
        );
        issues.extend(verdict.issues);

        ValidationOutcome {
            classification,
            completeness: verdict.completeness,
            extracted_artifact: Some(artifact),
            issues,
        }
    }
}
