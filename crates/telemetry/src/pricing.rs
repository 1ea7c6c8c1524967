//! Cost estimation for attempts.
//!
//! Prices come from the attempt's tier and are in USD per 1 million tokens.
//! Token counts reported by the provider win; otherwise they are estimated
//! from character counts.

use docforge_core::{ModelTier, Usage};

use crate::model::AttemptCost;

/// Stateless cost calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostEstimator;

impl CostEstimator {
    /// Estimate the token count for a number of characters.
    ///
    /// Heuristic: 1 token ≈ 4 characters. Rounds up.
    pub fn tokens_for_chars(chars: usize) -> u32 {
        chars.div_ceil(4).min(u32::MAX as usize) as u32
    }

    /// Estimate the token count for a string.
    pub fn estimate_tokens(text: &str) -> u32 {
        Self::tokens_for_chars(text.len())
    }

    /// Compute cost for the given token counts on a tier.
    pub fn cost(tier: &ModelTier, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 * tier.input_per_m + output_tokens as f64 * tier.output_per_m)
            / 1_000_000.0
    }

    /// Cost of one attempt given the request size and what came back.
    pub fn attempt(
        tier: &ModelTier,
        request_chars: usize,
        output: &str,
        usage: Option<Usage>,
    ) -> AttemptCost {
        let (input_tokens, output_tokens, reported) = match usage {
            Some(u) => (u.prompt_tokens, u.completion_tokens, true),
            None => (
                Self::tokens_for_chars(request_chars),
                Self::estimate_tokens(output),
                false,
            ),
        };
        AttemptCost {
            input_tokens,
            output_tokens,
            cost_usd: Self::cost(tier, input_tokens, output_tokens),
            reported,
        }
    }
}
