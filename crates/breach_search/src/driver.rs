//! The run loop shared by every strategy.
//!
//! The driver owns the oracle borrow and the invocation budget. Each
//! proposed candidate goes through the oracle's scoped clear/write/invoke
//! sequence; a true verdict ends the run at once, a candidate too long for
//! the input region becomes a rejected observation, and any other oracle
//! error aborts the run.

use crate::report::{Reporter, RunReport};
use crate::strategy::{Observation, Outcome, Proposal, Strategy};
use breach_core::{BreachResult, ExhaustReason, Finding, InvocationBudget};
use breach_oracle::Oracle;
use tracing::{info, trace};

type ProgressHook = Box<dyn FnMut(u64, &[u8])>;

/// Drives strategies against one oracle
pub struct Driver<O: Oracle> {
    oracle: O,
    budget: InvocationBudget,
    progress: Option<ProgressHook>,
}

impl<O: Oracle> Driver<O> {
    /// Drive `oracle` with an unlimited budget
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            budget: InvocationBudget::unlimited(),
            progress: None,
        }
    }

    /// Replace the invocation budget
    #[must_use]
    pub fn with_budget(mut self, budget: InvocationBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Call `hook` after every invocation with the total spent and the candidate
    #[must_use]
    pub fn with_progress(mut self, hook: impl FnMut(u64, &[u8]) + 'static) -> Self {
        self.progress = Some(Box::new(hook));
        self
    }

    /// Budget state, shared by every run of this driver
    pub fn budget(&self) -> &InvocationBudget {
        &self.budget
    }

    /// The driven oracle
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Mutable access to the driven oracle
    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    /// Release the oracle
    pub fn into_oracle(self) -> O {
        self.oracle
    }

    /// Run `strategy` to its finding.
    ///
    /// # Errors
    ///
    /// Returns `OracleTrap` or `LoadFailure` from the oracle; search outcomes,
    /// budget exhaustion included, are reported as findings
    pub fn run<S: Strategy + ?Sized>(&mut self, strategy: &mut S) -> BreachResult<RunReport> {
        let mut reporter = Reporter::new(strategy.name()).with_fingerprint(self.oracle.fingerprint());
        info!(
            strategy = strategy.name(),
            budget = ?self.budget.remaining(),
            "run started"
        );

        loop {
            let batch = match strategy.propose(&mut reporter) {
                Proposal::Done(finding) => return Ok(reporter.finish(finding)),
                Proposal::Batch(batch) => batch,
            };

            let mut observations = Vec::with_capacity(batch.len());
            for candidate in batch {
                if candidate.len() >= self.oracle.capacity() {
                    trace!(len = candidate.len(), "rejected");
                    reporter.record_rejected();
                    observations.push(Observation {
                        candidate,
                        outcome: Outcome::Rejected,
                    });
                    continue;
                }
                if let Err(err) = self.budget.consume() {
                    trace!(%err, "budget spent");
                    strategy.interrupted(&observations, &mut reporter);
                    let finding = Finding::exhausted(strategy.best_guess(), ExhaustReason::Budget);
                    return Ok(reporter.finish(finding));
                }

                let outcome = match self.oracle.evaluate(&candidate) {
                    Ok(evaluation) => {
                        reporter.record_invocation();
                        trace!(
                            candidate = %String::from_utf8_lossy(&candidate),
                            verdict = evaluation.verdict,
                            signal = evaluation.signal,
                            "evaluated"
                        );
                        if let Some(progress) = self.progress.as_mut() {
                            progress(self.budget.consumed(), &candidate);
                        }
                        if evaluation.verdict {
                            return Ok(reporter.finish(Finding::success(candidate)));
                        }
                        Outcome::Evaluated(evaluation)
                    }
                    Err(err) if !err.is_fatal() => {
                        trace!(%err, "rejected by oracle");
                        reporter.record_rejected();
                        Outcome::Rejected
                    }
                    Err(err) => return Err(err),
                };
                observations.push(Observation { candidate, outcome });
            }
            strategy.observe(&observations, &mut reporter);
        }
    }

    /// Run strategies in order until one succeeds or the budget is spent
    ///
    /// # Errors
    ///
    /// Stops at the first oracle error, as [`Driver::run`] does
    pub fn run_each<S, I>(&mut self, strategies: I) -> BreachResult<Vec<RunReport>>
    where
        S: Strategy,
        I: IntoIterator<Item = S>,
    {
        let mut reports = Vec::new();
        for mut strategy in strategies {
            let report = self.run(&mut strategy)?;
            let stop = report.is_success() || self.budget.is_exhausted();
            reports.push(report);
            if stop {
                break;
            }
        }
        Ok(reports)
    }
}
