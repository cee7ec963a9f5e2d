//! Run configuration.

use crate::candidate::CandidateSpace;
use crate::exhaustive::{DEFAULT_BATCH_SIZE, ExhaustiveEnumerator};
use crate::greedy::{DEFAULT_MAX_LEN, GreedyExtender};
use breach_core::{Alphabet, BreachError, BreachResult, InvocationBudget};
use serde::{Deserialize, Serialize};

/// Default body alphabet for flag searches
pub const DEFAULT_ALPHABET: &str = "a-z0-9_}";

/// Parameters shared by the prefix-driven strategies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Known prefixes, tried in order
    pub prefixes: Vec<String>,
    /// Fixed suffix for enumerated bodies
    pub suffix: String,
    /// Ordered symbols
    pub alphabet: Alphabet,
    /// Shortest enumerated body
    pub min_len: usize,
    /// Longest enumerated body, or longest greedy prefix
    pub max_len: usize,
    /// Total invocations across all prefixes
    pub budget: Option<u64>,
    /// Greedy stops after selecting this symbol
    pub terminator: Option<char>,
    /// Prefix position to resume at; earlier prefixes are skipped
    pub resume_prefix: usize,
    /// Enumeration index to start from within the `resume_prefix` universe
    pub resume_from: u64,
    /// Candidates per exhaustive batch
    pub batch_size: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RunConfig {
    /// Create a configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            prefixes: vec![String::new()],
            suffix: String::new(),
            alphabet: Alphabet::parse(DEFAULT_ALPHABET).unwrap_or_else(|_| Alphabet::digits()),
            min_len: 1,
            max_len: DEFAULT_MAX_LEN,
            budget: None,
            terminator: Some('}'),
            resume_prefix: 0,
            resume_from: 0,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the known prefixes
    #[must_use]
    pub fn with_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the enumerated body suffix
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Set the alphabet
    #[must_use]
    pub fn with_alphabet(mut self, alphabet: Alphabet) -> Self {
        self.alphabet = alphabet;
        self
    }

    /// Set body length bounds
    #[must_use]
    pub fn with_lengths(mut self, min_len: usize, max_len: usize) -> Self {
        self.min_len = min_len;
        self.max_len = max_len;
        self
    }

    /// Set the invocation budget
    #[must_use]
    pub fn with_budget(mut self, budget: Option<u64>) -> Self {
        self.budget = budget;
        self
    }

    /// Set the greedy terminator
    #[must_use]
    pub fn with_terminator(mut self, terminator: Option<char>) -> Self {
        self.terminator = terminator;
        self
    }

    /// Resume at universe index `index` of the prefix at position `prefix`
    #[must_use]
    pub fn with_resume(mut self, prefix: usize, index: u64) -> Self {
        self.resume_prefix = prefix;
        self.resume_from = index;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the offending field
    pub fn validate(&self) -> BreachResult<()> {
        if self.prefixes.is_empty() {
            return Err(BreachError::config("prefixes", "at least one prefix is required"));
        }
        if self.min_len > self.max_len {
            return Err(BreachError::config(
                "min_len",
                format!("{} is greater than max_len {}", self.min_len, self.max_len),
            ));
        }
        if self.resume_prefix >= self.prefixes.len() {
            return Err(BreachError::config(
                "resume_prefix",
                format!(
                    "{} is out of range for {} prefixes",
                    self.resume_prefix,
                    self.prefixes.len()
                ),
            ));
        }
        if self.batch_size == 0 {
            return Err(BreachError::config("batch_size", "must be at least 1"));
        }
        self.terminator_byte()?;
        Ok(())
    }

    /// The terminator as a byte
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a terminator outside `0..=255`
    pub fn terminator_byte(&self) -> BreachResult<Option<u8>> {
        self.terminator
            .map(|c| {
                u8::try_from(c).map_err(|_| {
                    BreachError::config("terminator", format!("{c:?} is not a single byte"))
                })
            })
            .transpose()
    }

    /// The invocation budget meter
    #[must_use]
    pub fn invocation_budget(&self) -> InvocationBudget {
        InvocationBudget::from_limit(self.budget)
    }

    /// One enumerator per prefix, starting at the resume point
    ///
    /// Prefixes before `resume_prefix` are skipped. The resume index applies
    /// to the `resume_prefix` universe only; later universes start at 0.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for invalid bounds or an oversized universe
    pub fn enumerators(&self) -> BreachResult<Vec<ExhaustiveEnumerator>> {
        self.validate()?;
        self.prefixes
            .iter()
            .enumerate()
            .skip(self.resume_prefix)
            .map(|(position, prefix)| {
                let space = CandidateSpace::new(
                    prefix.as_bytes(),
                    self.suffix.as_bytes(),
                    self.alphabet.clone(),
                    self.min_len,
                    self.max_len,
                )?;
                let start = if position == self.resume_prefix {
                    self.resume_from
                } else {
                    0
                };
                Ok(ExhaustiveEnumerator::resume(space, start)
                    .with_batch_size(self.batch_size)
                    .with_prefix_index(position))
            })
            .collect()
    }

    /// One greedy extender per prefix
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for invalid settings
    pub fn extenders(&self) -> BreachResult<Vec<GreedyExtender>> {
        self.validate()?;
        let terminator = self.terminator_byte()?;
        Ok(self
            .prefixes
            .iter()
            .map(|prefix| {
                GreedyExtender::new(prefix.as_bytes(), self.alphabet.clone())
                    .with_terminator(terminator)
                    .with_max_len(self.max_len)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breach_core::ExhaustReason;

    #[test]
    fn test_defaults() {
        let config = RunConfig::new();
        assert_eq!(config.alphabet, Alphabet::parse(DEFAULT_ALPHABET).unwrap());
        assert_eq!(config.terminator_byte().unwrap(), Some(b'}'));
        assert_eq!(config.max_len, 60);
        assert!(config.validate().is_ok());
        assert_eq!(config.invocation_budget().remaining(), None);
    }

    #[test]
    fn test_validation() {
        assert!(RunConfig::new().with_prefixes(Vec::<String>::new()).validate().is_err());
        assert!(RunConfig::new().with_lengths(3, 1).validate().is_err());
        assert!(RunConfig::new().with_terminator(Some('€')).validate().is_err());
        assert!(RunConfig::new().with_resume(1, 0).validate().is_err());
    }

    #[test]
    fn test_enumerators_per_prefix() {
        let config = RunConfig::new()
            .with_prefixes(["flag{", "CTF{"])
            .with_suffix("}")
            .with_alphabet(Alphabet::parse("ab").unwrap())
            .with_lengths(1, 2)
            .with_resume(0, 2);
        let enumerators = config.enumerators().unwrap();
        assert_eq!(enumerators.len(), 2);
        assert_eq!(enumerators[0].cursor(), 2);
        // the resume index belongs to the first universe only
        assert_eq!(enumerators[1].cursor(), 0);
        assert_eq!(enumerators[1].total(), 6);
        assert_eq!(enumerators[1].prefix_index(), Some(1));
    }

    #[test]
    fn test_resume_skips_finished_prefixes() {
        let config = RunConfig::new()
            .with_prefixes(["flag{", "CTF{", "ctf{"])
            .with_alphabet(Alphabet::parse("ab").unwrap())
            .with_lengths(1, 1)
            .with_resume(1, 1);
        let enumerators = config.enumerators().unwrap();
        assert_eq!(enumerators.len(), 2);
        assert_eq!(enumerators[0].prefix_index(), Some(1));
        assert_eq!(enumerators[0].cursor(), 1);
        assert_eq!(enumerators[1].prefix_index(), Some(2));
        assert_eq!(enumerators[1].cursor(), 0);
    }

    #[test]
    fn test_oversized_universe_is_reported() {
        let config = RunConfig::new().with_lengths(1, 40);
        assert!(config.enumerators().is_err());
    }

    #[test]
    fn test_extenders_carry_settings() {
        let config = RunConfig::new().with_prefixes(["L3m0nCTF{"]).with_lengths(1, 9);
        let extenders = config.extenders().unwrap();
        assert_eq!(extenders[0].state().prefix(), b"L3m0nCTF{");
        // the prefix already has the maximum length
        let mut greedy = extenders[0].clone();
        let mut reporter = crate::Reporter::new("greedy");
        let _ = crate::Strategy::propose(&mut greedy, &mut reporter);
        crate::Strategy::observe(
            &mut greedy,
            &[crate::Observation {
                candidate: b"L3m0nCTF{".to_vec(),
                outcome: crate::Outcome::Evaluated(breach_oracle::Evaluation::denied(9)),
            }],
            &mut reporter,
        );
        let crate::Proposal::Done(finding) = crate::Strategy::propose(&mut greedy, &mut reporter)
        else {
            panic!("expected the run to end");
        };
        assert_eq!(finding.reason(), Some(ExhaustReason::MaxLength));
    }

    #[test]
    fn test_json_roundtrip_with_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{"prefixes":["CTF{"],"alphabet":"0-9","budget":100}"#).unwrap();
        assert_eq!(config.prefixes, vec!["CTF{".to_string()]);
        assert_eq!(config.alphabet, Alphabet::digits());
        assert_eq!(config.budget, Some(100));
        assert_eq!(config.terminator, Some('}'));
    }
}
