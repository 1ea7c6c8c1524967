//! Lock-free telemetry engine: the shared usage sink.
//!
//! Independent tasks record into the same engine concurrently. Totals are
//! plain atomic counters, so recording never blocks and the result does not
//! depend on arrival order. An optional unbounded channel forwards every
//! record to an exporter.

use docforge_core::{TelemetrySink, UsageRecord};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

use crate::model::UsageSnapshot;

/// Costs are accumulated in nano-dollars to stay integral.
const NANOS_PER_USD: f64 = 1_000_000_000.0;

/// The shared usage sink.
#[derive(Debug, Default)]
pub struct TelemetryEngine {
    records: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    cost_nanos: AtomicU64,
    retried_attempts: AtomicU64,
    export: Option<mpsc::UnboundedSender<UsageRecord>>,
}

impl TelemetryEngine {
    /// Create an engine that only keeps totals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine that also forwards every record to the returned receiver.
    pub fn with_export() -> (Self, mpsc::UnboundedReceiver<UsageRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self {
            export: Some(tx),
            ..Self::default()
        };
        (engine, rx)
    }

    /// Current totals.
    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            records: self.records.load(Ordering::Relaxed),
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
            total_cost_usd: self.cost_nanos.load(Ordering::Relaxed) as f64 / NANOS_PER_USD,
            retried_attempts: self.retried_attempts.load(Ordering::Relaxed),
        }
    }

    /// Stop forwarding records so the exporter can drain and finish.
    pub fn close_export(&mut self) {
        self.export = None;
    }
}

impl TelemetrySink for TelemetryEngine {
    fn record(&self, record: UsageRecord) {
        self.records.fetch_add(1, Ordering::Relaxed);
        self.input_tokens
            .fetch_add(u64::from(record.input_tokens), Ordering::Relaxed);
        self.output_tokens
            .fetch_add(u64::from(record.output_tokens), Ordering::Relaxed);
        let nanos = (record.estimated_cost.max(0.0) * NANOS_PER_USD).round() as u64;
        self.cost_nanos.fetch_add(nanos, Ordering::Relaxed);
        if record.attempt > 1 {
            self.retried_attempts.fetch_add(1, Ordering::Relaxed);
        }

        tracing::debug!(
            task_id = %record.task_id,
            tier = %record.tier,
            attempt = record.attempt,
            input_tokens = record.input_tokens,
            output_tokens = record.output_tokens,
            cost_usd = record.estimated_cost,
            "Usage recorded"
        );

        if let Some(tx) = &self.export {
            // A gone exporter must never affect generation
            let _ = tx.send(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn record(attempt: u32, input: u32, output: u32, cost: f64) -> UsageRecord {
        UsageRecord {
            task_id: "t1".into(),
            tier: "fast".into(),
            attempt,
            input_tokens: input,
            output_tokens: output,
            estimated_cost: cost,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn record_updates_totals() {
        let engine = TelemetryEngine::new();
        engine.record(record(1, 100, 50, 0.002));
        engine.record(record(2, 200, 80, 0.003));

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.records, 2);
        assert_eq!(snapshot.input_tokens, 300);
        assert_eq!(snapshot.output_tokens, 130);
        assert_eq!(snapshot.retried_attempts, 1);
        assert!((snapshot.total_cost_usd - 0.005).abs() < 1e-9);
    }

    #[test]
    fn default_engine_is_empty() {
        let snapshot = TelemetryEngine::default().snapshot();
        assert_eq!(snapshot, UsageSnapshot::default());
    }

    #[tokio::test]
    async fn export_forwards_records() {
        let (engine, mut rx) = TelemetryEngine::with_export();
        engine.record(record(1, 1, 1, 0.0));
        let forwarded = rx.recv().await.unwrap();
        assert_eq!(forwarded.tier, "fast");
    }

    #[test]
    fn dropped_exporter_does_not_break_recording() {
        let (engine, rx) = TelemetryEngine::with_export();
        drop(rx);
        engine.record(record(1, 10, 10, 0.0));
        assert_eq!(engine.snapshot().records, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_recording_is_order_independent() {
        let engine = Arc::new(TelemetryEngine::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    engine.record(record(1, 3, 2, 0.000_001));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.records, 800);
        assert_eq!(snapshot.input_tokens, 2_400);
        assert_eq!(snapshot.output_tokens, 1_600);
        assert!((snapshot.total_cost_usd - 0.0008).abs() < 1e-9);
    }
}
