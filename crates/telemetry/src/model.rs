//! Data model for per-attempt costs and aggregated usage.

use serde::{Deserialize, Serialize};

/// Token counts and estimated cost of one attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AttemptCost {
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Estimated cost in USD
    pub cost_usd: f64,
    /// Whether the token counts came from the provider rather than the estimate
    pub reported: bool,
}

impl AttemptCost {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Point-in-time view of everything recorded so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Usage records received
    pub records: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_cost_usd: f64,
    /// Records that belonged to a second or later attempt of their task
    pub retried_attempts: u64,
}

impl UsageSnapshot {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_cost_totals() {
        let cost = AttemptCost {
            input_tokens: 10,
            output_tokens: 5,
            cost_usd: 0.0,
            reported: false,
        };
        assert_eq!(cost.total_tokens(), 15);
    }

    #[test]
    fn snapshot_serialization() {
        let snapshot = UsageSnapshot {
            records: 2,
            input_tokens: 100,
            output_tokens: 40,
            total_cost_usd: 0.5,
            retried_attempts: 1,
        };
        assert_eq!(snapshot.total_tokens(), 140);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains(r#""retried_attempts":1"#));
    }
}
