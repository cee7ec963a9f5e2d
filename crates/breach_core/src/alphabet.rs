//! Ordered symbol alphabets.
//!
//! Order matters: candidate enumeration is lexicographic over symbol index
//! and greedy ties go to the earliest symbol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered set of single-byte symbols with no duplicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Alphabet {
    symbols: Vec<u8>,
}

/// Alphabet construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlphabetError {
    /// No symbols
    #[error("Alphabet is empty")]
    Empty,

    /// A range whose end precedes its start
    #[error("Invalid range '{start}-{end}'")]
    InvalidRange {
        /// Range start
        start: char,
        /// Range end
        end: char,
    },

    /// A symbol outside the single-byte range
    #[error("Symbol '{0}' is not a single byte")]
    NonByteSymbol(char),
}

impl Alphabet {
    /// Build from raw symbols, dropping repeats but keeping first-seen order
    ///
    /// # Errors
    ///
    /// Returns error if no symbols remain
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Result<Self, AlphabetError> {
        let mut seen = [false; 256];
        let mut symbols = Vec::new();
        for &b in bytes.as_ref() {
            if !seen[usize::from(b)] {
                seen[usize::from(b)] = true;
                symbols.push(b);
            }
        }
        if symbols.is_empty() {
            return Err(AlphabetError::Empty);
        }
        Ok(Self { symbols })
    }

    /// Parse a spec such as `a-z0-9_}`.
    ///
    /// `x-y` expands to the inclusive byte range. A `-` at either end of the
    /// spec, or right after a completed range, is taken literally.
    ///
    /// # Errors
    ///
    /// Returns error on empty specs, reversed ranges and non-byte symbols
    pub fn parse(spec: &str) -> Result<Self, AlphabetError> {
        let chars: Vec<char> = spec.chars().collect();
        let mut bytes = Vec::with_capacity(chars.len());
        let mut i = 0;
        while i < chars.len() {
            let start = chars[i];
            if i + 2 < chars.len() && chars[i + 1] == '-' {
                let end = chars[i + 2];
                let (lo, hi) = (to_byte(start)?, to_byte(end)?);
                if hi < lo {
                    return Err(AlphabetError::InvalidRange { start, end });
                }
                bytes.extend(lo..=hi);
                i += 3;
            } else {
                bytes.push(to_byte(start)?);
                i += 1;
            }
        }
        Self::from_bytes(bytes)
    }

    /// The ten ASCII digits in order
    #[must_use]
    pub fn digits() -> Self {
        Self {
            symbols: (b'0'..=b'9').collect(),
        }
    }

    /// Symbols in order
    #[must_use]
    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    /// Number of symbols
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Always false; kept for API symmetry with collections
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbol at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<u8> {
        self.symbols.get(index).copied()
    }

    /// Position of `symbol` in the ordering
    #[must_use]
    pub fn index_of(&self, symbol: u8) -> Option<usize> {
        self.symbols.iter().position(|&s| s == symbol)
    }

    /// Whether `symbol` belongs to the alphabet
    #[must_use]
    pub fn contains(&self, symbol: u8) -> bool {
        self.index_of(symbol).is_some()
    }

    /// Iterate over symbols in order
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.symbols.iter().copied()
    }
}

fn to_byte(c: char) -> Result<u8, AlphabetError> {
    u8::try_from(u32::from(c)).map_err(|_| AlphabetError::NonByteSymbol(c))
}

impl TryFrom<String> for Alphabet {
    type Error = AlphabetError;

    fn try_from(spec: String) -> Result<Self, Self::Error> {
        Self::parse(&spec)
    }
}

impl From<Alphabet> for String {
    fn from(alphabet: Alphabet) -> Self {
        alphabet.to_string()
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &s in &self.symbols {
            write!(f, "{}", char::from(s))?;
        }
        Ok(())
    }
}
