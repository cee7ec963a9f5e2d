//! Side-channel greedy extension.
//!
//! Grows a known prefix one symbol per round, keeping the symbol whose
//! candidate drew the most probe calls. Best effort: it never backtracks
//! and reports the longest prefix it could justify when the signal stops
//! improving.

use crate::report::{Reporter, RoundTrace};
use crate::strategy::{Observation, Proposal, Strategy};
use breach_core::{Alphabet, ExhaustReason, Finding, SearchState};
use tracing::{debug, info, warn};

/// Default bound on the reconstructed length
pub const DEFAULT_MAX_LEN: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Baseline,
    Extend,
}

/// Greedy prefix extender
#[derive(Debug, Clone)]
pub struct GreedyExtender {
    state: SearchState,
    alphabet: Alphabet,
    terminator: Option<u8>,
    max_len: usize,
    phase: Phase,
    finding: Option<Finding>,
}

impl GreedyExtender {
    /// Extend `prefix` over `alphabet`
    #[must_use]
    pub fn new(prefix: impl Into<Vec<u8>>, alphabet: Alphabet) -> Self {
        Self {
            state: SearchState::new(prefix),
            alphabet,
            terminator: None,
            max_len: DEFAULT_MAX_LEN,
            phase: Phase::Baseline,
            finding: None,
        }
    }

    /// Stop after selecting `terminator`
    #[must_use]
    pub fn with_terminator(mut self, terminator: Option<u8>) -> Self {
        self.terminator = terminator;
        self
    }

    /// Bound the prefix length
    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Current search state
    #[must_use]
    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// Whether a terminator is set that the alphabet can never produce
    fn terminator_unreachable(&self) -> bool {
        self.terminator
            .is_some_and(|symbol| !self.alphabet.contains(symbol))
    }

    fn finish(&mut self, reason: ExhaustReason) {
        self.state.terminate();
        self.finding = Some(Finding::exhausted(self.state.prefix(), reason));
    }

    fn observe_baseline(&mut self, observations: &[Observation]) {
        match observations.first().and_then(Observation::signal) {
            Some(signal) => {
                self.state.observe_baseline(signal);
                debug!(signal, "baseline");
                self.phase = Phase::Extend;
            }
            None => {
                warn!(len = self.state.len(), "known prefix does not fit the input region");
                self.finish(ExhaustReason::Capacity);
            }
        }
    }

    fn observe_round(&mut self, observations: &[Observation], reporter: &mut Reporter) {
        let position = self.state.len();
        let previous = self.state.signal();

        let scored: Vec<(u8, u64)> = observations
            .iter()
            .filter_map(|o| Some((*o.candidate.last()?, o.signal()?)))
            .collect();
        let Some(best_signal) = scored.iter().map(|&(_, s)| s).max() else {
            warn!(position, "every candidate of the round was rejected");
            self.finish(ExhaustReason::Capacity);
            return;
        };
        let tied = scored.iter().filter(|&&(_, s)| s == best_signal).count();
        // earliest symbol wins ties; observations arrive in alphabet order
        let chosen = scored
            .iter()
            .find(|&&(_, s)| s == best_signal)
            .map(|&(c, _)| c);

        let flat = scored.len() > 1 && tied == scored.len();
        let improves = self.state.improves_on(best_signal);
        let chosen = chosen.filter(|_| improves && !flat);

        reporter.record_round(RoundTrace {
            position,
            chosen: chosen.map(char::from),
            best_signal,
            tied,
            previous,
        });

        let Some(symbol) = chosen else {
            warn!(position, best_signal, ?previous, flat, "signal stagnated");
            self.finish(ExhaustReason::Stagnated);
            return;
        };

        self.state.extend(symbol, best_signal);
        debug!(
            position,
            symbol = %char::from(symbol),
            signal = best_signal,
            tied,
            "extended prefix"
        );

        if Some(symbol) == self.terminator {
            info!(
                prefix = %String::from_utf8_lossy(self.state.prefix()),
                "terminator selected without a true verdict"
            );
            self.finish(ExhaustReason::TerminatorUnconfirmed);
        }
    }
}

impl Strategy for GreedyExtender {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn propose(&mut self, _reporter: &mut Reporter) -> Proposal {
        if let Some(finding) = self.finding.take() {
            return Proposal::Done(finding);
        }
        match self.phase {
            Phase::Baseline => {
                if self.terminator_unreachable() {
                    warn!(
                        alphabet = %self.alphabet,
                        "terminator is not in the alphabet, the secret cannot be confirmed"
                    );
                }
                Proposal::Batch(vec![self.state.prefix().to_vec()])
            }
            Phase::Extend if self.state.len() >= self.max_len => {
                self.state.terminate();
                Proposal::Done(Finding::exhausted(
                    self.state.prefix(),
                    ExhaustReason::MaxLength,
                ))
            }
            Phase::Extend => {
                let prefix = self.state.prefix();
                let batch = self
                    .alphabet
                    .iter()
                    .map(|symbol| {
                        let mut candidate = Vec::with_capacity(prefix.len() + 1);
                        candidate.extend_from_slice(prefix);
                        candidate.push(symbol);
                        candidate
                    })
                    .collect();
                Proposal::Batch(batch)
            }
        }
    }

    fn observe(&mut self, observations: &[Observation], reporter: &mut Reporter) {
        match self.phase {
            Phase::Baseline => self.observe_baseline(observations),
            Phase::Extend => self.observe_round(observations, reporter),
        }
    }

    fn best_guess(&self) -> Vec<u8> {
        self.state.prefix().to_vec()
    }
}
