//! Core error types for BREACH.
//!
//! Only conditions that stop a run outright are errors. Stagnation, budget
//! exhaustion and an enumerated universe are reported as a
//! [`Finding`](crate::Finding), never through this type.

/// Core result type
pub type BreachResult<T> = Result<T, BreachError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BreachError {
    /// The oracle module could not be compiled, linked or instantiated
    #[error("Oracle failed to load: {reason}")]
    LoadFailure {
        /// What went wrong while loading
        reason: String,
    },

    /// A candidate does not fit the oracle input region
    #[error("Candidate of {len} bytes exceeds input capacity {capacity} (one byte is reserved for the terminator)")]
    CapacityExceeded {
        /// Candidate length in bytes
        len: usize,
        /// Input region capacity in bytes
        capacity: usize,
    },

    /// The oracle trapped or ran out of fuel during an invocation
    #[error("Oracle trapped: {reason}")]
    OracleTrap {
        /// Trap description
        reason: String,
    },

    /// Invalid run or oracle configuration
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },
}

impl BreachError {
    /// Build a load failure from anything displayable
    pub fn load(reason: impl std::fmt::Display) -> Self {
        Self::LoadFailure {
            reason: reason.to_string(),
        }
    }

    /// Build a configuration error
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error must abort the whole run.
    ///
    /// Capacity rejections only discard the offending candidate.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::CapacityExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BreachError::load("missing export `unlock`");
        assert_eq!(
            err.to_string(),
            "Oracle failed to load: missing export `unlock`"
        );

        let err = BreachError::CapacityExceeded {
            len: 256,
            capacity: 256,
        };
        let s = err.to_string();
        assert!(s.contains("256 bytes"));
        assert!(s.contains("capacity 256"));
    }

    #[test]
    fn test_config_error() {
        let err = BreachError::config("alphabet", "empty");
        assert_eq!(err.to_string(), "Invalid configuration for alphabet: empty");
    }

    #[test]
    fn test_fatality() {
        assert!(BreachError::load("bad magic").is_fatal());
        assert!(
            BreachError::OracleTrap {
                reason: "unreachable".to_string()
            }
            .is_fatal()
        );
        assert!(
            !BreachError::CapacityExceeded {
                len: 300,
                capacity: 256
            }
            .is_fatal()
        );
    }
}
