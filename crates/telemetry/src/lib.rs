//! Cost estimation and usage telemetry for docforge.
//!
//! Every attempt produces one usage record: token counts (provider-reported
//! when available, estimated otherwise) and an estimated cost from the
//! attempt's tier pricing. Records flow into a lock-free engine that many
//! independent tasks can share.

pub mod engine;
pub mod export;
pub mod model;
pub mod pricing;

pub use engine::TelemetryEngine;
pub use export::spawn_jsonl_exporter;
pub use model::{AttemptCost, UsageSnapshot};
pub use pricing::CostEstimator;
