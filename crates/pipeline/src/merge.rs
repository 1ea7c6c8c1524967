//! Merge strategies for modifications.
//!
//! [`FullReplacement`] takes the provider's output as the new artifact.
//! [`AnchoredSplice`] treats the output as a fragment and splices it into the
//! prior artifact, but only when both ends of the fragment pin down exactly
//! one place to put it. Anything less certain is refused, and the fragment
//! is then validated on its own (where the ratio checks reject it).

use docforge_core::MergeMode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("fragment is empty")]
    EmptyFragment,

    #[error("anchor line not found in prior artifact: {0}")]
    AnchorNotFound(String),

    #[error("anchor line matches {matches} lines of prior artifact: {line}")]
    AmbiguousAnchor { line: String, matches: usize },

    #[error("closing anchor comes before opening anchor")]
    AnchorsOutOfOrder,
}

/// How a modification's output becomes the next artifact.
pub trait MergeStrategy: Send + Sync {
    fn mode(&self) -> MergeMode;

    fn merge(&self, prior: &str, output: &str) -> Result<String, MergeError>;
}

/// The output replaces the prior artifact wholesale.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullReplacement;

impl MergeStrategy for FullReplacement {
    fn mode(&self) -> MergeMode {
        MergeMode::Full
    }

    fn merge(&self, _prior: &str, output: &str) -> Result<String, MergeError> {
        Ok(output.to_string())
    }
}

/// Splices a fragment between two anchor lines of the prior artifact.
///
/// The fragment's first and last non-blank lines are the anchors. Each must
/// match (ignoring surrounding whitespace) exactly one line of the prior
/// artifact, and the first must not come after the last. The matched region,
/// anchors included, is replaced by the fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnchoredSplice;

impl AnchoredSplice {
    fn locate(prior: &[&str], anchor: &str) -> Result<usize, MergeError> {
        let anchor = anchor.trim();
        let mut hits = prior
            .iter()
            .enumerate()
            .filter(|(_, line)| line.trim() == anchor)
            .map(|(i, _)| i);

        let first = hits
            .next()
            .ok_or_else(|| MergeError::AnchorNotFound(anchor.to_string()))?;
        let extra = hits.count();
        if extra > 0 {
            return Err(MergeError::AmbiguousAnchor {
                line: anchor.to_string(),
                matches: extra + 1,
            });
        }
        Ok(first)
    }
}

impl MergeStrategy for AnchoredSplice {
    fn mode(&self) -> MergeMode {
        MergeMode::IncrementalAtAnchor
    }

    fn merge(&self, prior: &str, output: &str) -> Result<String, MergeError> {
        let fragment: Vec<&str> = output.lines().collect();
        let first = fragment
            .iter()
            .position(|l| !l.trim().is_empty())
            .ok_or(MergeError::EmptyFragment)?;
        let last = fragment
            .iter()
            .rposition(|l| !l.trim().is_empty())
            .ok_or(MergeError::EmptyFragment)?;
        let fragment = &fragment[first..=last];

        let prior_lines: Vec<&str> = prior.lines().collect();
        let open = Self::locate(&prior_lines, fragment[0])?;
        let close = Self::locate(&prior_lines, fragment[fragment.len() - 1])?;
        if close < open {
            return Err(MergeError::AnchorsOutOfOrder);
        }

        let merged: Vec<&str> = prior_lines[..open]
            .iter()
            .chain(fragment.iter())
            .chain(prior_lines[close + 1..].iter())
            .copied()
            .collect();
        Ok(merged.join("\n"))
    }
}

/// The strategy that implements a configured merge mode.
pub fn strategy_for(mode: MergeMode) -> Box<dyn MergeStrategy> {
    match mode {
        MergeMode::Full => Box::new(FullReplacement),
        MergeMode::IncrementalAtAnchor => Box::new(AnchoredSplice),
    }
}
