//! The strategy seam.
//!
//! Strategies never touch the oracle. They propose batches of candidates,
//! the [`Driver`](crate::Driver) evaluates them, and the strategy observes
//! the results. A true verdict ends the run in the driver, so strategies
//! only ever see rejected candidates and false verdicts.

use crate::report::Reporter;
use breach_core::Finding;
use breach_oracle::Evaluation;

/// What the oracle made of one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The candidate was written and the entry point called
    Evaluated(Evaluation),
    /// The candidate did not fit in the input region
    Rejected,
}

/// A candidate paired with its outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Candidate bytes
    pub candidate: Vec<u8>,
    /// Result of submitting it
    pub outcome: Outcome,
}

impl Observation {
    /// Signal of an evaluated candidate
    #[must_use]
    pub fn signal(&self) -> Option<u64> {
        match self.outcome {
            Outcome::Evaluated(evaluation) => Some(evaluation.signal),
            Outcome::Rejected => None,
        }
    }
}

/// Next step requested by a strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proposal {
    /// Evaluate these candidates in order
    Batch(Vec<Vec<u8>>),
    /// The run is over
    Done(Finding),
}

/// A search strategy
pub trait Strategy {
    /// Name used in logs and reports
    fn name(&self) -> &'static str;

    /// Propose the next batch, or finish
    fn propose(&mut self, reporter: &mut Reporter) -> Proposal;

    /// Observe the results of the complete batch last proposed
    fn observe(&mut self, observations: &[Observation], reporter: &mut Reporter);

    /// The run was cut short after `observations`, a prefix of the last batch
    fn interrupted(&mut self, observations: &[Observation], reporter: &mut Reporter) {
        let _ = (observations, reporter);
    }

    /// Best partial result if the run ends now
    fn best_guess(&self) -> Vec<u8>;
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn propose(&mut self, reporter: &mut Reporter) -> Proposal {
        (**self).propose(reporter)
    }

    fn observe(&mut self, observations: &[Observation], reporter: &mut Reporter) {
        (**self).observe(observations, reporter);
    }

    fn interrupted(&mut self, observations: &[Observation], reporter: &mut Reporter) {
        (**self).interrupted(observations, reporter);
    }

    fn best_guess(&self) -> Vec<u8> {
        (**self).best_guess()
    }
}
