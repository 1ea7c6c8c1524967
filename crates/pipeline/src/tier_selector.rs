//! Tier selection per attempt.

use docforge_core::{Completeness, GenerationMode, GenerationTask, ModelTier, TierLadder};

/// What the selector needs to know about an earlier attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierStep {
    pub rank: usize,
    pub completeness: Completeness,
}

/// Picks the tier rank for the next attempt of a task.
///
/// Ranks index into the ladder, cheapest first. The rank chosen for a task
/// never goes down from one attempt to the next.
#[derive(Debug, Clone)]
pub struct TierSelector {
    ladder: TierLadder,
    preescalate_prior_units: usize,
}

impl TierSelector {
    pub fn new(ladder: TierLadder, preescalate_prior_units: usize) -> Self {
        Self {
            ladder,
            preescalate_prior_units,
        }
    }

    pub fn ladder(&self) -> &TierLadder {
        &self.ladder
    }

    pub fn tier(&self, rank: usize) -> Option<&ModelTier> {
        self.ladder.get(rank)
    }

    /// Whether a tier above `rank` exists.
    pub fn can_escalate(&self, rank: usize) -> bool {
        self.ladder.has_above(rank)
    }

    /// Rank for the next attempt given the attempts made so far.
    pub fn select(&self, task: &GenerationTask, history: &[TierStep]) -> usize {
        let Some(last) = history.last() else {
            return self.initial_rank(task);
        };

        let floor = history.iter().map(|step| step.rank).max().unwrap_or(0);
        let next = if last.completeness == Completeness::Truncated && self.can_escalate(last.rank) {
            last.rank + 1
        } else {
            last.rank
        };
        next.max(floor)
    }

    /// Large modifications go straight to the top tier; everything else starts cheapest.
    fn initial_rank(&self, task: &GenerationTask) -> usize {
        if task.mode == GenerationMode::Modify && task.prior_units() > self.preescalate_prior_units
        {
            self.ladder.top_rank()
        } else {
            0
        }
    }
}
