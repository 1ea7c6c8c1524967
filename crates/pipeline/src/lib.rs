//! The adaptive generation pipeline.
//!
//! A task flows through the pieces of this crate in order:
//!
//! 1. **Select** a tier for the attempt ([`TierSelector`])
//! 2. **Stream** the provider reply into an [`Attempt`](docforge_core::Attempt) ([`StreamAccumulator`])
//! 3. **Classify** it as artifact or prose ([`ResponseClassifier`])
//! 4. **Extract** and clean the artifact ([`ArtifactExtractor`]), merging fragments if configured
//! 5. **Validate** completeness ([`CompletenessValidator`])
//! 6. **Decide**: return, reinforce and retry, escalate, or fail ([`EscalationController`])

pub mod accumulator;
pub mod assess;
pub mod classifier;
pub mod controller;
pub mod directives;
pub mod extractor;
pub mod locks;
pub mod merge;
pub mod retry;
pub mod tier_selector;
pub mod validator;

pub use accumulator::{Accumulation, StreamAccumulator};
pub use assess::{AssessContext, Assessor};
pub use classifier::{Classified, ResponseClassifier};
pub use controller::EscalationController;
pub use directives::RequestBuilder;
pub use extractor::ArtifactExtractor;
pub use locks::{TaskBusy, TaskGuard, TaskLocks};
pub use merge::{AnchoredSplice, FullReplacement, MergeError, MergeStrategy, strategy_for};
pub use retry::Backoff;
pub use tier_selector::{TierSelector, TierStep};
pub use validator::{CompletenessValidator, Verdict};
