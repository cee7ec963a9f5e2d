//! BREACH Core Types
//!
//! Pure types shared by the oracle adapter, the search strategies and the
//! command line: errors, findings, strategy search state, symbol alphabets
//! and the invocation budget. No I/O happens in this crate.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alphabet;
pub mod budget;
pub mod error;
pub mod finding;
pub mod state;

// Re-exports
pub use alphabet::{Alphabet, AlphabetError};
pub use budget::{BudgetError, InvocationBudget};
pub use error::{BreachError, BreachResult};
pub use finding::{ExhaustReason, Finding};
pub use state::SearchState;
