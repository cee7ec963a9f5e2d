//! Known-plaintext verification.
//!
//! When the secret has been assembled out of band (for instance by
//! decrypting a ciphertext found in the module's data section), it can be
//! confirmed without any side channel: a length, literal affixes and a
//! rolling checksum must all match. Optionally the oracle gets the final
//! word.

use crate::report::{Reporter, RunReport};
use crate::strategy::{Observation, Outcome, Proposal, Strategy};
use breach_core::{BreachError, BreachResult, ExhaustReason, Finding};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Default checksum seed
pub const DEFAULT_SEED: u32 = 0x1337_BEEF;

/// Rolling checksum over `bytes`.
///
/// Each byte is shifted by its position modulo 24, XORed into the
/// accumulator, and the accumulator is rotated left by 5.
#[must_use]
pub fn checksum(bytes: &[u8], seed: u32) -> u32 {
    bytes.iter().enumerate().fold(seed, |acc, (i, &b)| {
        (acc ^ (u32::from(b) << (i % 24))).rotate_left(5)
    })
}

/// Low `bits` of `value`
#[must_use]
pub fn low_bits(value: u32, bits: u32) -> u32 {
    if bits >= 32 {
        value
    } else {
        value & ((1 << bits) - 1)
    }
}

/// XOR `ciphertext` with `key` repeated to its length
///
/// # Errors
///
/// Returns `InvalidConfig` if `key` is empty
pub fn xor_repeating(ciphertext: &[u8], key: &[u8]) -> BreachResult<Vec<u8>> {
    if key.is_empty() {
        return Err(BreachError::config("key", "must not be empty"));
    }
    Ok(ciphertext
        .iter()
        .zip(key.iter().cycle())
        .map(|(c, k)| c ^ k)
        .collect())
}

/// The invariants a plaintext must satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaintextChecks {
    /// Exact length in bytes
    pub length: usize,
    /// Required leading bytes
    pub prefix: String,
    /// Required trailing bytes
    pub suffix: String,
    /// Checksum seed
    pub seed: u32,
    /// Number of low checksum bits compared
    pub bits: u32,
    /// Expected value of the low bits
    pub expected: u32,
}

impl Default for PlaintextChecks {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaintextChecks {
    /// Checks for the 40-byte `L3m0nCTF{...}` flag
    #[must_use]
    pub fn new() -> Self {
        Self {
            length: 40,
            prefix: "L3m0nCTF{".to_string(),
            suffix: "}".to_string(),
            seed: DEFAULT_SEED,
            bits: 16,
            expected: 0xD9CE,
        }
    }

    /// Set the required length
    #[must_use]
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    /// Set the literal affixes
    #[must_use]
    pub fn with_affixes(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self.suffix = suffix.into();
        self
    }

    /// Set seed, compared bit count and expected value
    #[must_use]
    pub fn with_checksum(mut self, seed: u32, bits: u32, expected: u32) -> Self {
        self.seed = seed;
        self.bits = bits;
        self.expected = expected;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero or oversized bit count, or an
    /// expected value wider than the bit count
    pub fn validate(&self) -> BreachResult<()> {
        if self.bits == 0 || self.bits > 32 {
            return Err(BreachError::config("bits", "must be between 1 and 32"));
        }
        if low_bits(self.expected, self.bits) != self.expected {
            return Err(BreachError::config(
                "expected",
                format!("{:#x} does not fit in {} bits", self.expected, self.bits),
            ));
        }
        Ok(())
    }

    /// Run all three checks on `candidate`
    #[must_use]
    pub fn verify(&self, candidate: &[u8]) -> Verification {
        let checksum = low_bits(checksum(candidate, self.seed), self.bits);
        Verification {
            length_ok: candidate.len() == self.length,
            prefix_ok: candidate.starts_with(self.prefix.as_bytes()),
            suffix_ok: candidate.ends_with(self.suffix.as_bytes()),
            checksum_ok: checksum == self.expected,
            checksum,
        }
    }
}

/// Per-check outcome of a verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// Length matched
    pub length_ok: bool,
    /// Prefix matched
    pub prefix_ok: bool,
    /// Suffix matched
    pub suffix_ok: bool,
    /// Masked checksum matched
    pub checksum_ok: bool,
    /// Masked checksum of the candidate
    pub checksum: u32,
}

impl Verification {
    /// All checks passed
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.length_ok && self.prefix_ok && self.suffix_ok && self.checksum_ok
    }

    /// Names of the failed checks
    #[must_use]
    pub fn failures(&self) -> Vec<&'static str> {
        [
            (self.length_ok, "length"),
            (self.prefix_ok, "prefix"),
            (self.suffix_ok, "suffix"),
            (self.checksum_ok, "checksum"),
        ]
        .into_iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, name)| name)
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Check,
    AwaitOracle,
    Denied(ExhaustReason),
}

/// Confirms one assembled candidate
#[derive(Debug, Clone)]
pub struct KnownPlaintextVerifier {
    candidate: Vec<u8>,
    checks: PlaintextChecks,
    confirm_with_oracle: bool,
    stage: Stage,
}

impl KnownPlaintextVerifier {
    /// Verify `candidate` against `checks`
    #[must_use]
    pub fn new(candidate: impl Into<Vec<u8>>, checks: PlaintextChecks) -> Self {
        Self {
            candidate: candidate.into(),
            checks,
            confirm_with_oracle: false,
            stage: Stage::Check,
        }
    }

    /// Submit a passing candidate to the oracle before reporting success
    #[must_use]
    pub fn with_oracle_confirmation(mut self, confirm: bool) -> Self {
        self.confirm_with_oracle = confirm;
        self
    }

    /// Run the checks alone, without an oracle
    #[must_use]
    pub fn run_offline(mut self) -> RunReport {
        self.confirm_with_oracle = false;
        let mut reporter = Reporter::new(self.name());
        let finding = match self.propose(&mut reporter) {
            Proposal::Done(finding) => finding,
            Proposal::Batch(_) => {
                Finding::exhausted(self.candidate.clone(), ExhaustReason::OracleDenied)
            }
        };
        reporter.finish(finding)
    }
}

impl Strategy for KnownPlaintextVerifier {
    fn name(&self) -> &'static str {
        "verifier"
    }

    fn propose(&mut self, reporter: &mut Reporter) -> Proposal {
        match self.stage {
            Stage::Check => {
                let verification = self.checks.verify(&self.candidate);
                reporter.set_verification(verification);
                if !verification.is_confirmed() {
                    warn!(
                        failed = ?verification.failures(),
                        checksum = format_args!("{:#06x}", verification.checksum),
                        "known-plaintext checks failed"
                    );
                    return Proposal::Done(Finding::exhausted(
                        self.candidate.clone(),
                        ExhaustReason::Rejected,
                    ));
                }
                info!(checksum = format_args!("{:#06x}", verification.checksum), "known-plaintext checks passed");
                if self.confirm_with_oracle {
                    self.stage = Stage::AwaitOracle;
                    Proposal::Batch(vec![self.candidate.clone()])
                } else {
                    Proposal::Done(Finding::success(self.candidate.clone()))
                }
            }
            // the driver ends the run on a true verdict, so reaching here means no
            Stage::AwaitOracle => Proposal::Done(Finding::exhausted(
                self.candidate.clone(),
                ExhaustReason::OracleDenied,
            )),
            Stage::Denied(reason) => {
                Proposal::Done(Finding::exhausted(self.candidate.clone(), reason))
            }
        }
    }

    fn observe(&mut self, observations: &[Observation], _reporter: &mut Reporter) {
        let reason = match observations.first().map(|o| o.outcome) {
            Some(Outcome::Rejected) => ExhaustReason::Capacity,
            _ => ExhaustReason::OracleDenied,
        };
        debug!(%reason, "oracle did not confirm the candidate");
        self.stage = Stage::Denied(reason);
    }

    fn best_guess(&self) -> Vec<u8> {
        self.candidate.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FLAG: &[u8] = b"L3m0nCTF{w4sm_0p4qu3_pr3d1c4t3s_4r3_fun}";

    const CIPHERTEXT: [u8; 40] = [
        0x16, 0x0F, 0x12, 0x2E, 0xF3, 0x08, 0x7E, 0xCA, 0x15, 0x7A, 0xC7, 0xD4, 0x34, 0x9E, 0x0B,
        0xF2, 0x6E, 0x4D, 0x0A, 0x2D, 0xC2, 0x3B, 0x58, 0xBF, 0x0A, 0x3C, 0x90, 0x93, 0x2D, 0xF2,
        0x48, 0xDD, 0x6E, 0x4E, 0x4C, 0x41, 0xFB, 0x3E, 0x44, 0xF1,
    ];

    const KEY: [u8; 16] = [
        0x5A, 0x3C, 0x7F, 0x1E, 0x9D, 0x4B, 0x2A, 0x8C, 0x6E, 0x0D, 0xF3, 0xA7, 0x59, 0xC1, 0x3B,
        0x82,
    ];

    /// Positions where any byte change reaches the low 16 checksum bits
    const SENSITIVE: [usize; 15] = [0, 1, 2, 8, 9, 10, 16, 17, 18, 26, 27, 28, 34, 35, 36];

    #[test]
    fn test_true_flag_checksum() {
        assert_eq!(low_bits(checksum(FLAG, DEFAULT_SEED), 16), 0xD9CE);
        let verification = PlaintextChecks::new().verify(FLAG);
        assert!(verification.is_confirmed());
        assert!(verification.failures().is_empty());
    }

    #[test]
    fn test_xor_repeating_recovers_flag() {
        assert_eq!(xor_repeating(&CIPHERTEXT, &KEY).unwrap(), FLAG);
        assert!(xor_repeating(&CIPHERTEXT, &[]).is_err());
    }

    #[test]
    fn test_checksum_empty_is_seed() {
        assert_eq!(checksum(&[], 7), 7);
        assert_eq!(low_bits(0xFFFF_FFFF, 32), 0xFFFF_FFFF);
    }

    #[test]
    fn test_failures_are_named() {
        let checks = PlaintextChecks::new();
        let verification = checks.verify(b"L3m0nCTF{short}");
        assert!(!verification.length_ok);
        assert!(verification.prefix_ok);
        assert!(verification.suffix_ok);
        assert!(verification.failures().contains(&"length"));

        let mut wrong_suffix = FLAG.to_vec();
        wrong_suffix[39] = b')';
        assert_eq!(checks.verify(&wrong_suffix).failures()[0], "suffix");
    }

    #[test]
    fn test_validate_bits() {
        assert!(PlaintextChecks::new().validate().is_ok());
        assert!(PlaintextChecks::new().with_checksum(1, 0, 0).validate().is_err());
        assert!(PlaintextChecks::new().with_checksum(1, 8, 0x1FF).validate().is_err());
    }

    #[test]
    fn test_strategy_without_oracle() {
        let mut verifier = KnownPlaintextVerifier::new(FLAG, PlaintextChecks::new());
        let mut reporter = Reporter::new("verifier");
        assert_eq!(
            verifier.propose(&mut reporter),
            Proposal::Done(Finding::success(FLAG))
        );
        let report = reporter.finish(Finding::success(FLAG));
        assert!(report.verification.unwrap().is_confirmed());
    }

    #[test]
    fn test_run_offline() {
        let report = KnownPlaintextVerifier::new(FLAG, PlaintextChecks::new())
            .with_oracle_confirmation(true)
            .run_offline();
        assert_eq!(report.finding, Finding::success(FLAG));
        assert_eq!(report.invocations, 0);

        let report = KnownPlaintextVerifier::new(&FLAG[..39], PlaintextChecks::new()).run_offline();
        assert_eq!(report.finding.reason(), Some(ExhaustReason::Rejected));
        assert_eq!(report.verification.unwrap().failures(), vec!["length", "suffix", "checksum"]);
    }

    #[test]
    fn test_strategy_rejects_without_proposing() {
        let mut mutated = FLAG.to_vec();
        mutated[9] = b'x';
        let mut verifier =
            KnownPlaintextVerifier::new(mutated.clone(), PlaintextChecks::new())
                .with_oracle_confirmation(true);
        assert_eq!(
            verifier.propose(&mut Reporter::new("verifier")),
            Proposal::Done(Finding::exhausted(mutated, ExhaustReason::Rejected))
        );
    }

    #[test]
    fn test_strategy_oracle_denied() {
        let mut verifier = KnownPlaintextVerifier::new(FLAG, PlaintextChecks::new())
            .with_oracle_confirmation(true);
        let mut reporter = Reporter::new("verifier");
        assert_eq!(
            verifier.propose(&mut reporter),
            Proposal::Batch(vec![FLAG.to_vec()])
        );
        verifier.observe(
            &[Observation {
                candidate: FLAG.to_vec(),
                outcome: Outcome::Evaluated(breach_oracle::Evaluation::denied(3)),
            }],
            &mut reporter,
        );
        assert_eq!(
            verifier.propose(&mut reporter),
            Proposal::Done(Finding::exhausted(FLAG, ExhaustReason::OracleDenied))
        );
    }

    proptest! {
        #[test]
        fn prop_sensitive_mutation_breaks_checksum(slot in 0usize..SENSITIVE.len(), delta in 1u8..=255) {
            let position = SENSITIVE[slot];
            let mut mutated = FLAG.to_vec();
            mutated[position] ^= delta;
            prop_assert!(!PlaintextChecks::new().verify(&mutated).checksum_ok);
        }
    }
}
