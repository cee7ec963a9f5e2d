//! In-process oracle backed by a Rust closure.
//!
//! Same region semantics as the WASM adapter (clear, terminated write,
//! capacity check) with the decision logic supplied directly. The closure
//! sees the region contents up to the first zero byte, the way a C-string
//! oracle would.

use crate::memory::InputRegion;
use crate::oracle::{Evaluation, Oracle};
use breach_core::BreachResult;

type Decide = Box<dyn FnMut(&[u8]) -> Evaluation + Send>;

/// Oracle whose decision is a closure over the terminated input
pub struct FnOracle {
    region: InputRegion,
    memory: Vec<u8>,
    decide: Decide,
    invocations: u64,
}

impl FnOracle {
    /// Create an oracle with an input region of `capacity` bytes
    pub fn new<F>(capacity: usize, decide: F) -> Self
    where
        F: FnMut(&[u8]) -> Evaluation + Send + 'static,
    {
        Self {
            region: InputRegion::new(0, capacity),
            memory: vec![0; capacity],
            decide: Box::new(decide),
            invocations: 0,
        }
    }

    /// Oracle accepting exactly `secret`, with a signal equal to the length
    /// of the longest common prefix of input and secret
    #[must_use]
    pub fn prefix_match(capacity: usize, secret: impl Into<Vec<u8>>) -> Self {
        let secret = secret.into();
        Self::new(capacity, move |input| {
            let matched = input
                .iter()
                .zip(&secret)
                .take_while(|(a, b)| a == b)
                .count();
            Evaluation::new(input == secret.as_slice(), matched as u64)
        })
    }

    /// Entry-point calls so far
    #[must_use]
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Raw region contents
    #[must_use]
    pub fn region(&self) -> &[u8] {
        self.region.view(&self.memory)
    }
}

impl Oracle for FnOracle {
    fn capacity(&self) -> usize {
        self.region.capacity
    }

    fn reset(&mut self) {
        self.region.clear(&mut self.memory);
    }

    fn set_input(&mut self, bytes: &[u8]) -> BreachResult<()> {
        self.region.write(&mut self.memory, bytes)
    }

    fn invoke(&mut self) -> BreachResult<Evaluation> {
        self.invocations += 1;
        let view = self.region.view(&self.memory);
        let len = view.iter().position(|&b| b == 0).unwrap_or(view.len());
        Ok((self.decide)(&view[..len]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breach_core::BreachError;

    #[test]
    fn test_prefix_match_oracle() {
        let mut oracle = FnOracle::prefix_match(16, "4242");
        assert_eq!(oracle.evaluate(b"4242").unwrap(), Evaluation::new(true, 4));
        assert_eq!(oracle.evaluate(b"4241").unwrap(), Evaluation::new(false, 3));
        assert_eq!(oracle.evaluate(b"42420").unwrap(), Evaluation::new(false, 4));
        assert_eq!(oracle.evaluate(b"").unwrap(), Evaluation::new(false, 0));
        assert_eq!(oracle.invocations(), 4);
    }

    #[test]
    fn test_set_input_boundary() {
        let mut oracle = FnOracle::prefix_match(8, "x");
        assert!(oracle.set_input(&[b'a'; 7]).is_ok());
        assert_eq!(
            oracle.set_input(&[b'a'; 8]),
            Err(BreachError::CapacityExceeded {
                len: 8,
                capacity: 8
            })
        );
    }

    #[test]
    fn test_reset_clears_region() {
        let mut oracle = FnOracle::prefix_match(8, "x");
        oracle.set_input(b"abcdef").unwrap();
        oracle.reset();
        assert_eq!(oracle.region(), &[0; 8]);
    }

    #[test]
    fn test_invoke_reads_up_to_terminator() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut oracle = FnOracle::new(8, move |input| {
            sink.lock().unwrap().push(input.to_vec());
            Evaluation::denied(0)
        });
        oracle.set_input(b"abcdef").unwrap();
        // no reset: the shorter write is still terminated
        oracle.set_input(b"ab").unwrap();
        oracle.invoke().unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), &[b"ab".to_vec()]);
    }

    fn accepts<O: Oracle>(mut oracle: O, candidate: &[u8]) -> bool {
        oracle.evaluate(candidate).unwrap().verdict
    }

    #[test]
    fn test_oracle_through_mut_ref_and_box() {
        let mut oracle = FnOracle::prefix_match(8, "ok");
        assert!(accepts(&mut oracle, b"ok"));
        assert!(!accepts(&mut oracle, b"no"));
        assert_eq!(oracle.invocations(), 2);

        let boxed: Box<dyn Oracle> = Box::new(FnOracle::prefix_match(8, "ok"));
        assert!(accepts(boxed, b"ok"));
    }
}
