//! Provider clients for docforge.
//!
//! Network transports live outside this workspace. What ships here are the
//! clients used to drive the pipeline offline: a scripted provider for tests
//! and a replay loader that turns recorded replies into scripts.

pub mod replay;
pub mod scripted;

pub use replay::{Recording, ReplayError, ReplayProvider};
pub use scripted::{RecordedCall, Script, ScriptStep, ScriptedProvider};
