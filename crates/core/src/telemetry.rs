//! Telemetry collaborator: where per-attempt usage records go.
//!
//! Recording is fire-and-forget: implementations must return immediately and
//! tolerate concurrent calls from independent tasks without locking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Usage and estimated cost of one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub task_id: String,
    pub tier: String,
    pub attempt: u32,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Estimated cost in USD
    pub estimated_cost: f64,
    pub recorded_at: DateTime<Utc>,
}

/// An append-only, order-independent sink for usage records.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, record: UsageRecord);
}

/// A sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn record(&self, _record: UsageRecord) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_record_serialization() {
        let record = UsageRecord {
            task_id: "t1".into(),
            tier: "fast".into(),
            attempt: 1,
            input_tokens: 100,
            output_tokens: 50,
            estimated_cost: 0.001,
            recorded_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""tier":"fast""#));
        assert!(json.contains(r#""attempt":1"#));
    }

    #[test]
    fn noop_sink_accepts_records() {
        let sink: &dyn TelemetrySink = &NoopSink;
        sink.record(UsageRecord {
            task_id: "t".into(),
            tier: "fast".into(),
            attempt: 1,
            input_tokens: 0,
            output_tokens: 0,
            estimated_cost: 0.0,
            recorded_at: Utc::now(),
        });
    }
}
