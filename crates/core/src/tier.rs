//! Model tiers: named provider configurations ordered by capability.

use serde::{Deserialize, Serialize};

/// A named provider configuration with an output ceiling and per-token pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTier {
    /// Tier name, e.g. "fast" or "capable"
    pub id: String,

    /// Provider model identifier used for this tier
    pub model: String,

    /// Maximum tokens the provider may emit in one attempt
    pub max_output_tokens: u32,

    /// Price per 1M input tokens in USD
    pub input_per_m: f64,

    /// Price per 1M output tokens in USD
    pub output_per_m: f64,
}

impl ModelTier {
    pub fn new(id: impl Into<String>, model: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            max_output_tokens,
            input_per_m: 0.0,
            output_per_m: 0.0,
        }
    }

    pub fn with_pricing(mut self, input_per_m: f64, output_per_m: f64) -> Self {
        self.input_per_m = input_per_m;
        self.output_per_m = output_per_m;
        self
    }
}

/// An ordered set of tiers, cheapest first.
///
/// Position in the ladder *is* the capability rank: index 0 is the default
/// tier and the last entry is the top tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierLadder {
    tiers: Vec<ModelTier>,
}

impl TierLadder {
    /// Build a ladder from tiers listed in ascending capability order.
    pub fn new(tiers: Vec<ModelTier>) -> Self {
        Self { tiers }
    }

    /// The stock two-rung ladder: `fast` then `capable`.
    pub fn standard() -> Self {
        Self::new(vec![
            ModelTier::new("fast", "anthropic/claude-3.5-haiku", 8_192).with_pricing(0.8, 4.0),
            ModelTier::new("capable", "anthropic/claude-sonnet-4", 64_000)
                .with_pricing(3.0, 15.0),
        ])
    }

    pub fn get(&self, rank: usize) -> Option<&ModelTier> {
        self.tiers.get(rank)
    }

    /// Rank of the tier with the given id.
    pub fn rank_of(&self, id: &str) -> Option<usize> {
        self.tiers.iter().position(|t| t.id == id)
    }

    /// Rank of the most capable tier.
    pub fn top_rank(&self) -> usize {
        self.tiers.len().saturating_sub(1)
    }

    pub fn has_above(&self, rank: usize) -> bool {
        rank < self.top_rank()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelTier> {
        self.tiers.iter()
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

impl Default for TierLadder {
    fn default() -> Self {
        Self::standard()
    }
}
