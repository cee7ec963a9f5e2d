//! Strategy-owned search state.

/// Best-known prefix of the secret together with the signal that backs it.
///
/// The signal only ever moves up: [`SearchState::extend`] refuses an
/// extension whose signal is below the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState {
    prefix: Vec<u8>,
    signal: Option<u64>,
    terminated: bool,
}

impl SearchState {
    /// Start from a known prefix with no signal observed yet
    #[must_use]
    pub fn new(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
            signal: None,
            terminated: false,
        }
    }

    /// Confirmed bytes so far
    #[must_use]
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Signal associated with the current prefix
    #[must_use]
    pub fn signal(&self) -> Option<u64> {
        self.signal
    }

    /// Record the signal of the bare prefix.
    ///
    /// Returns `false` if it would lower the current signal.
    pub fn observe_baseline(&mut self, signal: u64) -> bool {
        if self.signal.is_some_and(|current| signal < current) {
            return false;
        }
        self.signal = Some(signal);
        true
    }

    /// Append a symbol backed by `signal`.
    ///
    /// Returns `false` and leaves the state untouched if the run already
    /// terminated or the signal would decrease.
    pub fn extend(&mut self, symbol: u8, signal: u64) -> bool {
        if self.terminated || self.signal.is_some_and(|current| signal < current) {
            return false;
        }
        self.prefix.push(symbol);
        self.signal = Some(signal);
        true
    }

    /// Whether `signal` beats the current best strictly
    #[must_use]
    pub fn improves_on(&self, signal: u64) -> bool {
        self.signal.is_none_or(|current| signal > current)
    }

    /// Mark the run as finished
    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    /// Whether the run is finished
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Prefix length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.prefix.len()
    }

    /// Whether the prefix is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_state() {
        let state = SearchState::new("L3m0nCTF{");
        assert_eq!(state.prefix(), b"L3m0nCTF{");
        assert_eq!(state.signal(), None);
        assert!(!state.is_terminated());
        assert_eq!(state.len(), 9);
    }

    #[test]
    fn test_extend() {
        let mut state = SearchState::new("ab");
        assert!(state.observe_baseline(2));
        assert!(state.extend(b'c', 3));
        assert_eq!(state.prefix(), b"abc");
        assert_eq!(state.signal(), Some(3));
    }

    #[test]
    fn test_extend_rejects_lower_signal() {
        let mut state = SearchState::new("ab");
        state.observe_baseline(5);
        assert!(!state.extend(b'c', 4));
        assert_eq!(state.prefix(), b"ab");
        assert_eq!(state.signal(), Some(5));
    }

    #[test]
    fn test_terminated_state_is_frozen() {
        let mut state = SearchState::new("");
        state.terminate();
        assert!(!state.extend(b'x', 1));
        assert!(state.is_empty());
    }

    #[test]
    fn test_improves_on() {
        let mut state = SearchState::new("");
        assert!(state.improves_on(0));
        state.observe_baseline(3);
        assert!(!state.improves_on(3));
        assert!(state.improves_on(4));
    }

    proptest! {
        #[test]
        fn prop_signal_never_decreases(steps in proptest::collection::vec((any::<u8>(), 0u64..64), 0..32)) {
            let mut state = SearchState::new("");
            let mut last = None;
            for (symbol, signal) in steps {
                state.extend(symbol, signal);
                if let (Some(prev), Some(now)) = (last, state.signal()) {
                    prop_assert!(now >= prev);
                }
                last = state.signal();
            }
        }
    }
}
