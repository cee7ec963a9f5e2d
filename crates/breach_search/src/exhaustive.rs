//! Exhaustive enumeration over a finite universe.

use crate::candidate::{CandidateSpace, Candidates};
use crate::report::Reporter;
use crate::strategy::{Observation, Outcome, Proposal, Strategy};
use breach_core::{ExhaustReason, Finding};
use tracing::{debug, warn};

/// Candidates proposed per batch
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Tries every candidate of a [`CandidateSpace`] in order.
///
/// The signal is ignored; only the verdict matters.
#[derive(Debug, Clone)]
pub struct ExhaustiveEnumerator {
    candidates: Candidates,
    /// Index of the first candidate not yet observed
    cursor: u64,
    total: u64,
    batch_size: usize,
    last: Option<Vec<u8>>,
    /// Position of this universe's prefix among the run's prefixes
    prefix_index: Option<usize>,
}

impl ExhaustiveEnumerator {
    /// Enumerate `space` from its first candidate
    #[must_use]
    pub fn new(space: CandidateSpace) -> Self {
        Self::resume(space, 0)
    }

    /// Enumerate `space` starting at universe index `index`
    #[must_use]
    pub fn resume(space: CandidateSpace, index: u64) -> Self {
        let total = space.len();
        Self {
            candidates: space.into_iter_from(index),
            cursor: index,
            total,
            batch_size: DEFAULT_BATCH_SIZE,
            last: None,
            prefix_index: None,
        }
    }

    /// Set the batch size (at least 1)
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Tag resume points with the prefix position `index`
    #[must_use]
    pub fn with_prefix_index(mut self, index: usize) -> Self {
        self.prefix_index = Some(index);
        self
    }

    /// Position of this universe's prefix, if tagged
    #[must_use]
    pub fn prefix_index(&self) -> Option<usize> {
        self.prefix_index
    }

    /// Index of the next candidate to evaluate
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Universe size
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    fn advance_past(&mut self, observations: &[Observation], reporter: &mut Reporter) {
        let rejected = observations
            .iter()
            .filter(|o| o.outcome == Outcome::Rejected)
            .count();
        if rejected > 0 {
            warn!(rejected, "candidates too long for the input region");
        }
        if let Some(last) = observations.last() {
            self.last = Some(last.candidate.clone());
        }
        self.cursor += observations.len() as u64;
        reporter.set_resume_from(self.prefix_index, self.cursor);
    }
}

impl Strategy for ExhaustiveEnumerator {
    fn name(&self) -> &'static str {
        "exhaustive"
    }

    fn propose(&mut self, _reporter: &mut Reporter) -> Proposal {
        let batch: Vec<Vec<u8>> = self.candidates.by_ref().take(self.batch_size).collect();
        if batch.is_empty() {
            debug!(total = self.total, "universe exhausted");
            return Proposal::Done(Finding::exhausted(
                self.best_guess(),
                ExhaustReason::Exhausted,
            ));
        }
        debug!(from = self.cursor, len = batch.len(), "proposing batch");
        Proposal::Batch(batch)
    }

    fn observe(&mut self, observations: &[Observation], reporter: &mut Reporter) {
        self.advance_past(observations, reporter);
    }

    fn interrupted(&mut self, observations: &[Observation], reporter: &mut Reporter) {
        self.advance_past(observations, reporter);
    }

    fn best_guess(&self) -> Vec<u8> {
        self.last.clone().unwrap_or_default()
    }
}
