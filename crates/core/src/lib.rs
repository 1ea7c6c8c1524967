//! # docforge Core
//!
//! Domain types, traits, and error definitions for the docforge artifact
//! generation pipeline. This crate has **no runtime machinery**; it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the pipeline is defined as a trait here:
//! - [`ProviderClient`]: the streaming generative-text backend
//! - [`TelemetrySink`]: fire-and-forget usage recording
//! - [`ArtifactStore`]: persistence, invoked by callers only
//!
//! Implementations live in their respective crates, which keeps the
//! dependency graph pointing inward and makes every seam replaceable in tests.

pub mod error;
pub mod event;
pub mod grammar;
pub mod outcome;
pub mod provider;
pub mod store;
pub mod task;
pub mod telemetry;
pub mod tier;

// Re-export key types at crate root for ergonomics
pub use error::{GenerationError, GenerationErrorKind, ProviderError};
pub use event::{EventBus, PipelineEvent};
pub use grammar::ArtifactGrammar;
pub use outcome::{
    Attempt, AttemptSummary, Classification, Completeness, GenerationResult, ValidationOutcome,
};
pub use provider::{
    Directive, FinishReason, MergeMode, ProviderClient, ProviderRequest, StreamChunk,
    StreamReceiver, Usage,
};
pub use store::{ArtifactMetadata, ArtifactStore};
pub use task::{Attachment, GenerationMode, GenerationTask, TaskId, units};
pub use telemetry::{NoopSink, TelemetrySink, UsageRecord};
pub use tier::{ModelTier, TierLadder};
