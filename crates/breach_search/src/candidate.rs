//! Finite candidate universes.
//!
//! A universe is `prefix + body + suffix` where the body ranges over every
//! string of length `min_len..=max_len` over an alphabet. Order is
//! deterministic: shorter bodies first, then lexicographic by alphabet
//! position with the leftmost symbol most significant. Every candidate has
//! a stable index, so a run can resume where an earlier one stopped.

use breach_core::{Alphabet, BreachError, BreachResult};
use serde::{Deserialize, Serialize};

/// A finite, ordered set of candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpace {
    prefix: Vec<u8>,
    suffix: Vec<u8>,
    alphabet: Alphabet,
    min_len: usize,
    max_len: usize,
    size: u64,
}

impl CandidateSpace {
    /// Build a universe of wrapped bodies
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `min_len > max_len` or the universe size
    /// does not fit in a `u64`
    pub fn new(
        prefix: impl Into<Vec<u8>>,
        suffix: impl Into<Vec<u8>>,
        alphabet: Alphabet,
        min_len: usize,
        max_len: usize,
    ) -> BreachResult<Self> {
        if min_len > max_len {
            return Err(BreachError::config(
                "min_len",
                format!("{min_len} is greater than max_len {max_len}"),
            ));
        }
        let size = universe_size(alphabet.len(), min_len, max_len)?;
        Ok(Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            alphabet,
            min_len,
            max_len,
            size,
        })
    }

    /// All decimal PINs of exactly `width` digits, `00..0` first
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `width` is zero or `10^width` overflows
    pub fn pins(width: usize) -> BreachResult<Self> {
        if width == 0 {
            return Err(BreachError::config("width", "must be at least 1"));
        }
        Self::new(Vec::new(), Vec::new(), Alphabet::digits(), width, width)
    }

    /// Number of candidates
    #[must_use]
    pub fn len(&self) -> u64 {
        self.size
    }

    /// Never true for a valid space; kept for API symmetry
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Candidate at `index`, or `None` past the end
    #[must_use]
    pub fn nth(&self, index: u64) -> Option<Vec<u8>> {
        let (body_len, digits) = self.locate(index)?;
        debug_assert_eq!(digits.len(), body_len);
        Some(self.assemble(&digits))
    }

    /// Iterate from the first candidate
    #[must_use]
    pub fn iter(&self) -> Candidates {
        self.clone().into_iter_from(0)
    }

    /// Owning iterator starting at `index`
    #[must_use]
    pub fn into_iter_from(self, index: u64) -> Candidates {
        let digits = self.locate(index).map(|(_, digits)| digits);
        Candidates {
            space: self,
            index,
            digits,
        }
    }

    /// Body length and per-position alphabet indices for `index`
    fn locate(&self, index: u64) -> Option<(usize, Vec<usize>)> {
        if index >= self.size {
            return None;
        }
        let base = self.alphabet.len() as u64;
        let mut rest = index;
        for body_len in self.min_len..=self.max_len {
            let count = pow(base, body_len)?;
            if rest < count {
                let mut digits = vec![0usize; body_len];
                for slot in digits.iter_mut().rev() {
                    *slot = (rest % base) as usize;
                    rest /= base;
                }
                return Some((body_len, digits));
            }
            rest -= count;
        }
        None
    }

    fn assemble(&self, digits: &[usize]) -> Vec<u8> {
        let mut candidate = Vec::with_capacity(self.prefix.len() + digits.len() + self.suffix.len());
        candidate.extend_from_slice(&self.prefix);
        candidate.extend(digits.iter().filter_map(|&d| self.alphabet.get(d)));
        candidate.extend_from_slice(&self.suffix);
        candidate
    }
}

fn pow(base: u64, exp: usize) -> Option<u64> {
    base.checked_pow(u32::try_from(exp).ok()?)
}

fn universe_size(base: usize, min_len: usize, max_len: usize) -> BreachResult<u64> {
    let overflow = || BreachError::config("universe", "size does not fit in 64 bits");
    let mut total: u64 = 0;
    for body_len in min_len..=max_len {
        let count = pow(base as u64, body_len).ok_or_else(overflow)?;
        total = total.checked_add(count).ok_or_else(overflow)?;
    }
    Ok(total)
}

/// Odometer over a [`CandidateSpace`]
#[derive(Debug, Clone)]
pub struct Candidates {
    space: CandidateSpace,
    index: u64,
    digits: Option<Vec<usize>>,
}

impl Candidates {
    /// Universe index of the next candidate to be yielded
    #[must_use]
    pub fn position(&self) -> u64 {
        self.index
    }

    fn advance(&mut self) {
        let base = self.space.alphabet.len();
        let Some(digits) = self.digits.as_mut() else {
            return;
        };
        for slot in digits.iter_mut().rev() {
            *slot += 1;
            if *slot < base {
                return;
            }
            *slot = 0;
        }
        // every position wrapped: next body length starts at all zeros
        let next_len = digits.len() + 1;
        if next_len > self.space.max_len {
            self.digits = None;
        } else {
            *digits = vec![0; next_len];
        }
    }
}

impl Iterator for Candidates {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.space.size {
            return None;
        }
        let candidate = self.space.assemble(self.digits.as_deref()?);
        self.index += 1;
        self.advance();
        Some(candidate)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = usize::try_from(self.space.size.saturating_sub(self.index)).ok();
        (left.unwrap_or(usize::MAX), left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn abc() -> Alphabet {
        Alphabet::parse("abc").unwrap()
    }

    #[test]
    fn test_pins_order_and_size() {
        let space = CandidateSpace::pins(4).unwrap();
        assert_eq!(space.len(), 10_000);
        assert_eq!(space.nth(0).unwrap(), b"0000");
        assert_eq!(space.nth(4242).unwrap(), b"4242");
        assert_eq!(space.nth(9_999).unwrap(), b"9999");
        assert_eq!(space.nth(10_000), None);
    }

    #[test]
    fn test_pins_zero_width_rejected() {
        assert!(matches!(
            CandidateSpace::pins(0),
            Err(BreachError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_shorter_bodies_first() {
        let space = CandidateSpace::new("F{", "}", abc(), 1, 2).unwrap();
        assert_eq!(space.len(), 3 + 9);
        let all: Vec<String> = space
            .iter()
            .map(|c| String::from_utf8(c).unwrap())
            .collect();
        assert_eq!(
            all,
            vec![
                "F{a}", "F{b}", "F{c}", "F{aa}", "F{ab}", "F{ac}", "F{ba}", "F{bb}", "F{bc}",
                "F{ca}", "F{cb}", "F{cc}"
            ]
        );
    }

    #[test]
    fn test_empty_body_allowed() {
        let space = CandidateSpace::new("x", "y", abc(), 0, 1).unwrap();
        assert_eq!(space.len(), 4);
        assert_eq!(space.nth(0).unwrap(), b"xy");
        assert_eq!(space.nth(1).unwrap(), b"xay");
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(CandidateSpace::new("", "", abc(), 3, 2).is_err());
    }

    #[test]
    fn test_size_overflow_is_config_error() {
        let alphabet = Alphabet::parse("a-z0-9").unwrap();
        let err = CandidateSpace::new("", "", alphabet, 1, 40).unwrap_err();
        assert!(matches!(err, BreachError::InvalidConfig { ref field, .. } if field == "universe"));
    }

    #[test]
    fn test_resume_from_index() {
        let space = CandidateSpace::new("", "", abc(), 1, 2).unwrap();
        let mut iter = space.clone().into_iter_from(4);
        assert_eq!(iter.position(), 4);
        assert_eq!(iter.next().unwrap(), b"ab");
        assert_eq!(iter.position(), 5);
        assert_eq!(iter.count(), 7);
        assert_eq!(space.into_iter_from(12).next(), None);
    }

    proptest! {
        #[test]
        fn prop_iterator_agrees_with_nth(start in 0u64..40, min in 0usize..3, extra in 0usize..2) {
            let space = CandidateSpace::new("p", "s", abc(), min, min + extra).unwrap();
            let from_iter: Vec<Vec<u8>> = space.clone().into_iter_from(start).collect();
            let from_nth: Vec<Vec<u8>> = (start..space.len()).filter_map(|i| space.nth(i)).collect();
            prop_assert_eq!(from_iter, from_nth);
        }
    }
}
