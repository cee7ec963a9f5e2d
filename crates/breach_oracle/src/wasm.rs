//! wasmtime-backed oracle adapter.

use crate::compile::{ModuleLoader, fingerprint};
use crate::config::OracleConfig;
use crate::host::{HostProbe, Parity, ProbeState};
use crate::memory::InputRegion;
use crate::oracle::{Evaluation, Oracle};
use breach_core::{BreachError, BreachResult};
use std::path::Path;
use tracing::{debug, info, trace, warn};
use wasmtime::{Caller, Config, Engine, Instance, Linker, Memory, Store, TypedFunc};

/// A loaded WASM oracle.
///
/// Owns the store, the instance and the only view of its memory. The probe
/// call counter lives in the store data, so each instance has its own.
pub struct WasmOracle {
    region: InputRegion,
    store: Store<ProbeState>,
    memory: Memory,
    entry: TypedFunc<(), i32>,
    fingerprint: String,
    config: OracleConfig,
}

impl WasmOracle {
    /// Load a module with the parity probe
    ///
    /// # Errors
    ///
    /// Returns `LoadFailure` if the module cannot be compiled, linked or
    /// instantiated, or does not expose the configured memory and entry point
    pub fn load(wasm_bytes: &[u8], config: OracleConfig) -> BreachResult<Self> {
        Self::load_with_probe(wasm_bytes, config, Box::new(Parity))
    }

    /// Read a module from disk and load it with the parity probe
    ///
    /// # Errors
    ///
    /// Returns `LoadFailure` if the file cannot be read or loaded
    pub fn from_file(path: impl AsRef<Path>, config: OracleConfig) -> BreachResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| BreachError::load(format!("{}: {}", path.display(), e)))?;
        Self::load(&bytes, config)
    }

    /// Load a module with a caller-supplied probe
    ///
    /// # Errors
    ///
    /// Same as [`WasmOracle::load`]
    pub fn load_with_probe(
        wasm_bytes: &[u8],
        config: OracleConfig,
        probe: Box<dyn HostProbe>,
    ) -> BreachResult<Self> {
        config.validate()?;

        let mut engine_config = Config::new();
        engine_config.consume_fuel(config.fuel_per_call.is_some());
        let engine = Engine::new(&engine_config).map_err(BreachError::load)?;

        let loader = ModuleLoader::new(&config);
        let module = loader.compile(&engine, wasm_bytes)?;
        if !loader.check_imports(&module, &config)? {
            warn!(
                import = %format!("{}::{}", config.import_module, config.import_name),
                "module never imports the probe; signal will always be zero"
            );
        }

        let mut linker: Linker<ProbeState> = Linker::new(&engine);
        linker
            .func_wrap(
                &config.import_module,
                &config.import_name,
                |mut caller: Caller<'_, ProbeState>, value: i32| -> i32 {
                    caller.data_mut().dispatch(value)
                },
            )
            .map_err(BreachError::load)?;

        let probe_state = ProbeState::new(probe, config.record_probe_calls);
        let mut store = Store::new(&engine, probe_state);
        if let Some(fuel) = config.fuel_per_call {
            store.set_fuel(fuel).map_err(BreachError::load)?;
        }

        let instance: Instance = linker
            .instantiate(&mut store, &module)
            .map_err(BreachError::load)?;

        let memory = instance
            .get_memory(&mut store, &config.memory_export)
            .ok_or_else(|| {
                BreachError::load(format!("missing memory export `{}`", config.memory_export))
            })?;

        let entry = instance
            .get_typed_func::<(), i32>(&mut store, &config.entry_export)
            .map_err(|e| {
                BreachError::load(format!("entry export `{}`: {}", config.entry_export, e))
            })?;

        let region = InputRegion::new(config.input_offset, config.capacity);
        region.check_within(memory.data_size(&store))?;

        let fingerprint = fingerprint(wasm_bytes);
        info!(
            fingerprint = %&fingerprint[..16],
            probe = store.data().probe_name(),
            capacity = config.capacity,
            offset = config.input_offset,
            "oracle loaded"
        );

        Ok(Self {
            region,
            store,
            memory,
            entry,
            fingerprint,
            config,
        })
    }

    /// Input region
    #[must_use]
    pub fn region(&self) -> InputRegion {
        self.region
    }

    /// Probe arguments from the last invocation, if recording is enabled
    #[must_use]
    pub fn probe_calls(&self) -> Option<&[i32]> {
        self.store.data().recorded()
    }

    /// Current linear memory size in bytes
    #[must_use]
    pub fn memory_size(&self) -> usize {
        self.memory.data_size(&self.store)
    }

    /// Copy `len` bytes of linear memory starting at `offset`
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the window runs past the end of memory
    pub fn peek(&self, offset: usize, len: usize) -> BreachResult<Vec<u8>> {
        let data = self.memory.data(&self.store);
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                BreachError::config(
                    "peek",
                    format!(
                        "window 0x{:X}+{} exceeds {} bytes of memory",
                        offset,
                        len,
                        data.len()
                    ),
                )
            })?;
        Ok(data[offset..end].to_vec())
    }
}

impl Oracle for WasmOracle {
    fn capacity(&self) -> usize {
        self.region.capacity
    }

    fn reset(&mut self) {
        let data = self.memory.data_mut(&mut self.store);
        self.region.clear(data);
    }

    fn set_input(&mut self, bytes: &[u8]) -> BreachResult<()> {
        let data = self.memory.data_mut(&mut self.store);
        self.region.write(data, bytes)
    }

    fn invoke(&mut self) -> BreachResult<Evaluation> {
        self.store.data_mut().reset();
        if let Some(fuel) = self.config.fuel_per_call {
            self.store
                .set_fuel(fuel)
                .map_err(|e| BreachError::OracleTrap {
                    reason: e.to_string(),
                })?;
        }

        let ret = self
            .entry
            .call(&mut self.store, ())
            .map_err(|e| {
                debug!(error = %e, "oracle invocation trapped");
                BreachError::OracleTrap {
                    reason: e.to_string(),
                }
            })?;

        let evaluation = Evaluation::new(ret != 0, self.store.data().calls());
        trace!(verdict = evaluation.verdict, signal = evaluation.signal, "invoked oracle");
        Ok(evaluation)
    }

    fn fingerprint(&self) -> Option<String> {
        Some(self.fingerprint.clone())
    }
}

impl std::fmt::Debug for WasmOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmOracle")
            .field("fingerprint", &self.fingerprint)
            .field("region", &self.region)
            .field("probe", self.store.data())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::FnProbe;

    /// Oracle that accepts exactly `secret` and calls the probe once per
    /// matching byte before the first mismatch.
    fn prefix_oracle(secret: &str) -> Vec<u8> {
        wat::parse_str(format!(
            r#"(module
                (import "env" "x" (func $x (param i32) (result i32)))
                (memory (export "memory") 1)
                (data (i32.const 1024) "{secret}\00")
                (func (export "unlock") (result i32)
                    (local $i i32)
                    (block $fail
                        (loop $next
                            (br_if $fail
                                (i32.ne
                                    (i32.load8_u (local.get $i))
                                    (i32.load8_u offset=1024 (local.get $i))))
                            (if (i32.eqz (i32.load8_u offset=1024 (local.get $i)))
                                (then (return (i32.const 1))))
                            (drop (call $x (local.get $i)))
                            (local.set $i (i32.add (local.get $i) (i32.const 1)))
                            (br $next)))
                    (i32.const 0)))"#
        ))
        .unwrap()
    }

    /// Oracle reading a fixed 8-byte window, so residue past the terminator
    /// changes its verdict. Accepts "AB" followed by six zero bytes.
    fn window_oracle() -> Vec<u8> {
        wat::parse_str(
            r#"(module
                (import "env" "x" (func $x (param i32) (result i32)))
                (memory (export "memory") 1)
                (func (export "unlock") (result i32)
                    (i64.eq (i64.load (i32.const 0)) (i64.const 16961))))"#,
        )
        .unwrap()
    }

    #[test]
    fn test_load_and_evaluate() {
        let mut oracle = WasmOracle::load(&prefix_oracle("4242"), OracleConfig::new()).unwrap();
        assert_eq!(oracle.capacity(), 256);
        assert_eq!(oracle.evaluate(b"4242").unwrap(), Evaluation::new(true, 4));
        assert_eq!(oracle.evaluate(b"4200").unwrap(), Evaluation::new(false, 2));
        assert_eq!(oracle.evaluate(b"").unwrap(), Evaluation::new(false, 0));
        assert!(oracle.fingerprint().is_some());
    }

    #[test]
    fn test_signal_counts_only_current_invocation() {
        let mut oracle = WasmOracle::load(&prefix_oracle("abc"), OracleConfig::new()).unwrap();
        oracle.evaluate(b"ab").unwrap();
        assert_eq!(oracle.evaluate(b"a").unwrap().signal, 1);
    }

    #[test]
    fn test_set_input_capacity_boundary() {
        let mut oracle = WasmOracle::load(&prefix_oracle("x"), OracleConfig::new()).unwrap();
        assert!(oracle.set_input(&[b'a'; 255]).is_ok());
        assert_eq!(
            oracle.set_input(&[b'a'; 256]),
            Err(BreachError::CapacityExceeded {
                len: 256,
                capacity: 256
            })
        );
    }

    #[test]
    fn test_reset_prevents_residue() {
        let mut oracle = WasmOracle::load(&window_oracle(), OracleConfig::new()).unwrap();

        oracle.set_input(b"ABCDEFG").unwrap();
        assert!(!oracle.invoke().unwrap().verdict);

        // a bare write leaves "DEFG" behind the new terminator
        oracle.set_input(b"AB").unwrap();
        assert!(!oracle.invoke().unwrap().verdict);

        assert!(oracle.evaluate(b"AB").unwrap().verdict);
    }

    #[test]
    fn test_oracle_may_dirty_memory() {
        let wasm = wat::parse_str(
            r#"(module
                (import "env" "x" (func $x (param i32) (result i32)))
                (memory (export "memory") 1)
                (func (export "unlock") (result i32)
                    (local $ok i32)
                    (local.set $ok (i32.eqz (i32.load8_u (i32.const 4))))
                    (i32.store (i32.const 4) (i32.const -1))
                    (local.get $ok)))"#,
        )
        .unwrap();
        let mut oracle = WasmOracle::load(&wasm, OracleConfig::new()).unwrap();
        assert!(oracle.evaluate(b"A").unwrap().verdict);
        assert_eq!(oracle.peek(4, 4).unwrap(), vec![0xFF; 4]);
        // the next evaluation starts from a cleared region
        assert!(oracle.evaluate(b"A").unwrap().verdict);
    }

    #[test]
    fn test_parity_probe_is_faithful() {
        let wasm = wat::parse_str(
            r#"(module
                (import "env" "x" (func $x (param i32) (result i32)))
                (memory (export "memory") 1)
                (func (export "unlock") (result i32)
                    (call $x (i32.load8_u (i32.const 0)))))"#,
        )
        .unwrap();
        let mut oracle = WasmOracle::load(&wasm, OracleConfig::new()).unwrap();
        // '7' = 0x37 = 0b110111, five bits set
        assert_eq!(oracle.evaluate(b"7").unwrap(), Evaluation::new(true, 1));
        // '3' = 0x33 = 0b110011, four bits set
        assert_eq!(oracle.evaluate(b"3").unwrap(), Evaluation::new(false, 1));
    }

    #[test]
    fn test_custom_probe_changes_verdicts() {
        let wasm = wat::parse_str(
            r#"(module
                (import "env" "x" (func $x (param i32) (result i32)))
                (memory (export "memory") 1)
                (func (export "unlock") (result i32)
                    (call $x (i32.load8_u (i32.const 0)))))"#,
        )
        .unwrap();
        let probe = Box::new(FnProbe::new("zero", |_| 0));
        let mut oracle = WasmOracle::load_with_probe(&wasm, OracleConfig::new(), probe).unwrap();
        assert_eq!(oracle.evaluate(b"7").unwrap(), Evaluation::new(false, 1));
    }

    #[test]
    fn test_probe_recording() {
        let config = OracleConfig::new().with_probe_recording(true);
        let mut oracle = WasmOracle::load(&prefix_oracle("abc"), config).unwrap();
        oracle.evaluate(b"abx").unwrap();
        assert_eq!(oracle.probe_calls(), Some(&[0, 1][..]));
    }

    #[test]
    fn test_custom_region() {
        let config = OracleConfig::new().with_input_region(4096, 16);
        let mut oracle = WasmOracle::load(&prefix_oracle("abc"), config).unwrap();
        oracle.set_input(b"hello").unwrap();
        assert_eq!(&oracle.peek(4096, 6).unwrap(), b"hello\0");
        oracle.reset();
        assert_eq!(oracle.peek(4096, 16).unwrap(), vec![0; 16]);
    }

    #[test]
    fn test_load_failures() {
        let bad = WasmOracle::load(b"not wasm at all", OracleConfig::new()).unwrap_err();
        assert!(matches!(bad, BreachError::LoadFailure { .. }));

        let no_entry = OracleConfig::new().with_entry_export("open");
        let err = WasmOracle::load(&prefix_oracle("a"), no_entry).unwrap_err();
        assert!(err.to_string().contains("open"));

        let no_memory = OracleConfig::new().with_memory_export("heap");
        assert!(WasmOracle::load(&prefix_oracle("a"), no_memory).is_err());

        let out_of_bounds = OracleConfig::new().with_input_region(65500, 256);
        let err = WasmOracle::load(&prefix_oracle("a"), out_of_bounds).unwrap_err();
        assert!(err.to_string().contains("outside"));

        let foreign = wat::parse_str(
            r#"(module (import "env" "y" (func (param i32) (result i32))) (memory (export "memory") 1))"#,
        )
        .unwrap();
        assert!(WasmOracle::load(&foreign, OracleConfig::new()).is_err());
    }

    #[test]
    fn test_fuel_bounds_runaway_oracle() {
        let wasm = wat::parse_str(
            r#"(module
                (memory (export "memory") 1)
                (func (export "unlock") (result i32)
                    (loop $spin (br $spin))
                    (i32.const 0)))"#,
        )
        .unwrap();
        let config = OracleConfig::new().with_fuel_per_call(Some(10_000));
        let mut oracle = WasmOracle::load(&wasm, config).unwrap();
        let err = oracle.evaluate(b"x").unwrap_err();
        assert!(matches!(err, BreachError::OracleTrap { .. }));
    }

    #[test]
    fn test_fuel_refilled_per_call() {
        let config = OracleConfig::new().with_fuel_per_call(Some(100_000));
        let mut oracle = WasmOracle::load(&prefix_oracle("abcdef"), config).unwrap();
        for _ in 0..50 {
            assert!(oracle.evaluate(b"abcdef").unwrap().verdict);
        }
    }

    #[test]
    fn test_from_missing_file() {
        let err = WasmOracle::from_file("/nonexistent/oracle.wasm", OracleConfig::new()).unwrap_err();
        assert!(matches!(err, BreachError::LoadFailure { .. }));
    }
}
