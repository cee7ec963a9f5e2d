//! Host probe supplied to the oracle.
//!
//! The oracle imports exactly one `i32 -> i32` function and calls it while
//! validating a candidate. The adapter counts those calls; the count is the
//! side channel. The probe must compute what the oracle expects, otherwise
//! verdicts are silently wrong.

/// Host function injected into the oracle
pub trait HostProbe: Send {
    /// Compute the probe result for `value`
    fn call(&mut self, value: i32) -> i32;

    /// Probe name for logs
    fn name(&self) -> &str {
        "probe"
    }
}

/// XOR-reduction of all set bits of the 32-bit input
#[must_use]
pub fn parity(value: i32) -> i32 {
    ((value as u32).count_ones() & 1) as i32
}

/// The parity probe the reference oracle expects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Parity;

impl HostProbe for Parity {
    fn call(&mut self, value: i32) -> i32 {
        parity(value)
    }

    fn name(&self) -> &str {
        "parity"
    }
}

/// Probe backed by a closure
pub struct FnProbe<F> {
    name: String,
    f: F,
}

impl<F> FnProbe<F>
where
    F: FnMut(i32) -> i32 + Send,
{
    /// Wrap a closure as a probe
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> HostProbe for FnProbe<F>
where
    F: FnMut(i32) -> i32 + Send,
{
    fn call(&mut self, value: i32) -> i32 {
        (self.f)(value)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Store data for an oracle instance: the probe plus its call counter
pub struct ProbeState {
    probe: Box<dyn HostProbe>,
    calls: u64,
    recorded: Option<Vec<i32>>,
}

impl ProbeState {
    /// Create state around a probe
    #[must_use]
    pub fn new(probe: Box<dyn HostProbe>, record: bool) -> Self {
        Self {
            probe,
            calls: 0,
            recorded: record.then(Vec::new),
        }
    }

    /// Dispatch one call from the guest
    pub fn dispatch(&mut self, value: i32) -> i32 {
        self.calls += 1;
        if let Some(recorded) = self.recorded.as_mut() {
            recorded.push(value);
        }
        self.probe.call(value)
    }

    /// Zero the counter and drop recorded arguments
    pub fn reset(&mut self) {
        self.calls = 0;
        if let Some(recorded) = self.recorded.as_mut() {
            recorded.clear();
        }
    }

    /// Calls since the last reset
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Arguments since the last reset, if recording is enabled
    #[must_use]
    pub fn recorded(&self) -> Option<&[i32]> {
        self.recorded.as_deref()
    }

    /// Name of the wrapped probe
    #[must_use]
    pub fn probe_name(&self) -> &str {
        self.probe.name()
    }
}

impl std::fmt::Debug for ProbeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeState")
            .field("probe", &self.probe.name())
            .field("calls", &self.calls)
            .field("recording", &self.recorded.is_some())
            .finish()
    }
}
