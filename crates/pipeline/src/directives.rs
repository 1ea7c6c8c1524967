//! Request assembly, including the reinforcement directives added on retries.

use docforge_config::DirectiveConfig;
use docforge_core::{
    Directive, GenerationMode, GenerationTask, MergeMode, ModelTier, ProviderRequest,
};

/// Builds the provider request for one attempt.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    texts: DirectiveConfig,
    merge: MergeMode,
}

impl RequestBuilder {
    pub fn new(texts: DirectiveConfig, merge: MergeMode) -> Self {
        Self { texts, merge }
    }

    pub fn directive_text(&self, directive: Directive) -> &str {
        match directive {
            Directive::CompleteArtifact => &self.texts.complete_artifact,
            Directive::ArtifactOnly => &self.texts.artifact_only,
        }
    }

    /// Directives are rendered once each, in the order given.
    pub fn build(
        &self,
        task: &GenerationTask,
        tier: &ModelTier,
        directives: &[Directive],
    ) -> ProviderRequest {
        let mut rendered: Vec<String> = Vec::with_capacity(directives.len());
        for (i, directive) in directives.iter().enumerate() {
            if directives[..i].contains(directive) {
                continue;
            }
            rendered.push(self.directive_text(*directive).to_string());
        }

        // Fragments only make sense when there is something to splice into
        let merge = match (task.mode, &task.prior_artifact) {
            (GenerationMode::Modify, Some(_)) => self.merge,
            _ => MergeMode::Full,
        };

        ProviderRequest {
            model: tier.model.clone(),
            max_tokens: tier.max_output_tokens,
            mode: task.mode,
            instruction: task.instruction.clone(),
            prior_artifact: task.prior_artifact.clone(),
            attachment: task.attachment.clone(),
            conversation_context: task.conversation_context.clone(),
            directives: rendered,
            merge,
        }
    }
}
