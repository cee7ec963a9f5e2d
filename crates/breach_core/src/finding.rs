//! Search run outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a run ended without a confirmed secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExhaustReason {
    /// Every candidate in the declared universe was tried
    Exhausted,
    /// A greedy round did not raise the signal above the previous best
    Stagnated,
    /// The invocation budget ran out
    Budget,
    /// The reconstructed prefix hit the maximum length bound
    MaxLength,
    /// The terminator symbol was selected but the oracle never said yes
    TerminatorUnconfirmed,
    /// Every candidate of a round was too long for the input region
    Capacity,
    /// The known-plaintext checks failed
    Rejected,
    /// The known-plaintext checks passed but the oracle verdict was false
    OracleDenied,
}

impl ExhaustReason {
    /// Short stable label used in reports
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::Stagnated => "stagnated",
            Self::Budget => "budget",
            Self::MaxLength => "max-length",
            Self::TerminatorUnconfirmed => "terminator-unconfirmed",
            Self::Capacity => "capacity",
            Self::Rejected => "rejected",
            Self::OracleDenied => "oracle-denied",
        }
    }
}

impl fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable result of one search run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Finding {
    /// The oracle accepted this secret
    Success {
        /// Accepted bytes
        #[serde(with = "text_bytes")]
        secret: Vec<u8>,
    },
    /// The run ended without confirmation
    Exhausted {
        /// Best partial reconstruction at the time the run ended
        #[serde(with = "text_bytes")]
        best_guess: Vec<u8>,
        /// Why the run ended
        reason: ExhaustReason,
    },
}

impl Finding {
    /// Create a success finding
    #[must_use]
    pub fn success(secret: impl Into<Vec<u8>>) -> Self {
        Self::Success {
            secret: secret.into(),
        }
    }

    /// Create an exhausted finding
    #[must_use]
    pub fn exhausted(best_guess: impl Into<Vec<u8>>, reason: ExhaustReason) -> Self {
        Self::Exhausted {
            best_guess: best_guess.into(),
            reason,
        }
    }

    /// Whether the secret was confirmed
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The secret or the best guess
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Success { secret } => secret,
            Self::Exhausted { best_guess, .. } => best_guess,
        }
    }

    /// The secret or best guess as (lossy) text
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.bytes()).into_owned()
    }

    /// Exhaust reason, if the run was not successful
    #[must_use]
    pub fn reason(&self) -> Option<ExhaustReason> {
        match self {
            Self::Success { .. } => None,
            Self::Exhausted { reason, .. } => Some(*reason),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { .. } => write!(f, "Success({})", self.text()),
            Self::Exhausted { reason, .. } => {
                write!(f, "Exhausted({}, {})", self.text(), reason)
            }
        }
    }
}

/// Secrets are ASCII in practice; serialize them as text for readable reports.
mod text_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(String::deserialize(deserializer)?.into_bytes())
    }
}
