//! Invocation budget for bounding oracle work.

use serde::{Deserialize, Serialize};

/// Meter over the total number of oracle invocations in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationBudget {
    /// Maximum invocations, `None` for unlimited
    pub limit: Option<u64>,
    /// Invocations spent so far
    pub consumed: u64,
}

impl InvocationBudget {
    /// Create a budget capped at `limit` invocations
    #[must_use]
    pub fn new(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            consumed: 0,
        }
    }

    /// Create an uncapped budget
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            limit: None,
            consumed: 0,
        }
    }

    /// Create from an optional cap
    #[must_use]
    pub fn from_limit(limit: Option<u64>) -> Self {
        limit.map_or_else(Self::unlimited, Self::new)
    }

    /// Spend one invocation
    ///
    /// # Errors
    ///
    /// Returns error if the budget is already spent
    pub fn consume(&mut self) -> Result<(), BudgetError> {
        match self.limit {
            Some(limit) if self.consumed >= limit => {
                return Err(BudgetError::Exhausted { limit });
            }
            _ => {}
        }
        self.consumed += 1;
        Ok(())
    }

    /// Whether another invocation is affordable
    #[must_use]
    pub fn can_afford(&self) -> bool {
        self.limit.is_none_or(|limit| self.consumed < limit)
    }

    /// Invocations left, `None` for unlimited
    #[must_use]
    pub fn remaining(&self) -> Option<u64> {
        self.limit.map(|limit| limit.saturating_sub(self.consumed))
    }

    /// Invocations spent so far
    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Whether the budget is spent
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        !self.can_afford()
    }
}

impl Default for InvocationBudget {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Budget errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BudgetError {
    /// No invocations left
    #[error("Invocation budget of {limit} exhausted")]
    Exhausted {
        /// Configured cap
        limit: u64,
    },
}
