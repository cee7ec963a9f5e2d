//! The oracle call surface.

use breach_core::BreachResult;
use serde::{Deserialize, Serialize};

/// Outcome of one entry-point invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Evaluation {
    /// Entry point returned nonzero
    pub verdict: bool,
    /// Probe calls made during the invocation
    pub signal: u64,
}

impl Evaluation {
    /// Create an evaluation
    #[must_use]
    pub fn new(verdict: bool, signal: u64) -> Self {
        Self { verdict, signal }
    }

    /// A rejecting evaluation with the given signal
    #[must_use]
    pub fn denied(signal: u64) -> Self {
        Self::new(false, signal)
    }
}

/// A decision oracle with a single input region.
///
/// Invocations are not reentrant and every implementation owns its memory
/// exclusively, hence `&mut self` throughout.
pub trait Oracle {
    /// Input region size in bytes, terminator included
    fn capacity(&self) -> usize;

    /// Zero-fill the whole input region
    fn reset(&mut self);

    /// Write `bytes` plus a terminator at the start of the input region
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` if `bytes.len() >= capacity`
    fn set_input(&mut self, bytes: &[u8]) -> BreachResult<()>;

    /// Call the entry point exactly once
    ///
    /// # Errors
    ///
    /// Returns `OracleTrap` if the oracle traps or runs out of fuel
    fn invoke(&mut self) -> BreachResult<Evaluation>;

    /// Stable identifier of the loaded oracle, if it has one
    fn fingerprint(&self) -> Option<String> {
        None
    }

    /// Clear, write, invoke.
    ///
    /// Memory is left dirty afterwards; the next evaluation clears it.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Oracle::set_input`] and [`Oracle::invoke`]
    fn evaluate(&mut self, candidate: &[u8]) -> BreachResult<Evaluation> {
        self.reset();
        self.set_input(candidate)?;
        self.invoke()
    }
}

impl<O: Oracle + ?Sized> Oracle for &mut O {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn reset(&mut self) {
        (**self).reset();
    }

    fn set_input(&mut self, bytes: &[u8]) -> BreachResult<()> {
        (**self).set_input(bytes)
    }

    fn invoke(&mut self) -> BreachResult<Evaluation> {
        (**self).invoke()
    }

    fn fingerprint(&self) -> Option<String> {
        (**self).fingerprint()
    }

    fn evaluate(&mut self, candidate: &[u8]) -> BreachResult<Evaluation> {
        (**self).evaluate(candidate)
    }
}

impl<O: Oracle + ?Sized> Oracle for Box<O> {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn reset(&mut self) {
        (**self).reset();
    }

    fn set_input(&mut self, bytes: &[u8]) -> BreachResult<()> {
        (**self).set_input(bytes)
    }

    fn invoke(&mut self) -> BreachResult<Evaluation> {
        (**self).invoke()
    }

    fn fingerprint(&self) -> Option<String> {
        (**self).fingerprint()
    }

    fn evaluate(&mut self, candidate: &[u8]) -> BreachResult<Evaluation> {
        (**self).evaluate(candidate)
    }
}
