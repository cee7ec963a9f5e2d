//! Result reporting.
//!
//! A [`Reporter`] accumulates counters and traces while a run is in
//! progress; [`Reporter::finish`] consumes it and produces the single
//! [`RunReport`] of the run.

use crate::verifier::Verification;
use breach_core::{ExhaustReason, Finding};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One round of greedy extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundTrace {
    /// Index in the secret that the round tried to fill
    pub position: usize,
    /// Selected symbol, `None` if the round stagnated
    pub chosen: Option<char>,
    /// Largest signal seen in the round
    pub best_signal: u64,
    /// Symbols sharing the largest signal
    pub tied: usize,
    /// Signal of the prefix before the round
    pub previous: Option<u64>,
}

/// Serialisable outcome of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Strategy that produced the finding
    pub strategy: String,
    /// The finding
    pub finding: Finding,
    /// Oracle invocations spent by this run
    pub invocations: u64,
    /// Candidates refused for length
    pub rejected: u64,
    /// Greedy rounds in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rounds: Vec<RoundTrace>,
    /// Universe index to continue an interrupted enumeration from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_from: Option<u64>,
    /// Position of the interrupted universe's prefix in a multi-prefix run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_prefix: Option<usize>,
    /// Known-plaintext check results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
    /// blake3 fingerprint of the oracle module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl RunReport {
    /// Whether the run confirmed a secret
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.finding.is_success()
    }
}

/// Collects run statistics until the finding is known
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    strategy: String,
    invocations: u64,
    rejected: u64,
    rounds: Vec<RoundTrace>,
    resume_from: Option<u64>,
    resume_prefix: Option<usize>,
    verification: Option<Verification>,
    fingerprint: Option<String>,
}

impl Reporter {
    /// Start reporting for `strategy`
    #[must_use]
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            ..Self::default()
        }
    }

    /// Attach the oracle fingerprint
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: Option<String>) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Count one oracle invocation
    pub fn record_invocation(&mut self) {
        self.invocations += 1;
    }

    /// Count one candidate refused for length
    pub fn record_rejected(&mut self) {
        self.rejected += 1;
    }

    /// Append a greedy round
    pub fn record_round(&mut self, round: RoundTrace) {
        self.rounds.push(round);
    }

    /// Set the next enumeration index, and the prefix it belongs to
    pub fn set_resume_from(&mut self, prefix: Option<usize>, index: u64) {
        self.resume_from = Some(index);
        self.resume_prefix = prefix;
    }

    /// Store known-plaintext results
    pub fn set_verification(&mut self, verification: Verification) {
        self.verification = Some(verification);
    }

    /// Rounds recorded so far
    #[must_use]
    pub fn rounds(&self) -> &[RoundTrace] {
        &self.rounds
    }

    /// Close the run with its finding
    #[must_use]
    pub fn finish(self, finding: Finding) -> RunReport {
        info!(
            strategy = %self.strategy,
            finding = %finding,
            invocations = self.invocations,
            rejected = self.rejected,
            "run finished"
        );
        // only an interrupted enumeration has anything left to resume
        let (resume_from, resume_prefix) = match finding.reason() {
            None | Some(ExhaustReason::Exhausted) => (None, None),
            Some(_) => (self.resume_from, self.resume_prefix),
        };
        RunReport {
            strategy: self.strategy,
            finding,
            invocations: self.invocations,
            rejected: self.rejected,
            rounds: self.rounds,
            resume_from,
            resume_prefix,
            verification: self.verification,
            fingerprint: self.fingerprint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_counts() {
        let mut reporter = Reporter::new("greedy").with_fingerprint(Some("ab".into()));
        reporter.record_invocation();
        reporter.record_invocation();
        reporter.record_rejected();
        reporter.record_round(RoundTrace {
            position: 9,
            chosen: Some('w'),
            best_signal: 10,
            tied: 1,
            previous: Some(9),
        });
        let report = reporter.finish(Finding::exhausted("L3m0nCTF{w", ExhaustReason::Budget));
        assert_eq!(report.strategy, "greedy");
        assert_eq!(report.invocations, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.rounds.len(), 1);
        assert_eq!(report.fingerprint.as_deref(), Some("ab"));
        assert!(!report.is_success());
    }

    #[test]
    fn test_resume_point_survives_only_interruption() {
        let mut reporter = Reporter::new("exhaustive");
        reporter.set_resume_from(Some(1), 17);
        assert_eq!(reporter.clone().finish(Finding::success("x")).resume_from, None);
        let finished = reporter
            .clone()
            .finish(Finding::exhausted("x", ExhaustReason::Exhausted));
        assert_eq!(finished.resume_from, None);
        assert_eq!(finished.resume_prefix, None);
        let report = reporter.finish(Finding::exhausted("x", ExhaustReason::Budget));
        assert_eq!(report.resume_from, Some(17));
        assert_eq!(report.resume_prefix, Some(1));
    }

    #[test]
    fn test_report_json_shape() {
        let report = Reporter::new("exhaustive").finish(Finding::success("4242"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["strategy"], "exhaustive");
        assert_eq!(json["finding"]["outcome"], "success");
        assert_eq!(json["finding"]["secret"], "4242");
        assert!(json.get("rounds").is_none());
        assert!(json.get("resume_from").is_none());

        let back: RunReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
