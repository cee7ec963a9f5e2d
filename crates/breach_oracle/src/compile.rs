//! WASM module validation and compilation.

use crate::config::OracleConfig;
use breach_core::{BreachError, BreachResult};
use tracing::debug;
use wasmtime::{Engine, ExternType, Module, ValType};

/// Validates and compiles oracle modules
pub struct ModuleLoader {
    /// Largest accepted module in bytes
    max_module_size: usize,
}

impl ModuleLoader {
    /// Create a loader from oracle configuration
    #[must_use]
    pub fn new(config: &OracleConfig) -> Self {
        Self {
            max_module_size: config.max_module_size,
        }
    }

    /// Check size, magic number and version
    ///
    /// # Errors
    ///
    /// Returns `LoadFailure` describing the first violated check
    pub fn validate(&self, wasm_bytes: &[u8]) -> BreachResult<()> {
        if wasm_bytes.len() > self.max_module_size {
            return Err(BreachError::load(format!(
                "module size {} exceeds limit {}",
                wasm_bytes.len(),
                self.max_module_size
            )));
        }

        if wasm_bytes.len() < 8 {
            return Err(BreachError::load("module too small"));
        }

        if &wasm_bytes[0..4] != b"\0asm" {
            return Err(BreachError::load("invalid magic number"));
        }

        let version = &wasm_bytes[4..8];
        if version != b"\x01\x00\x00\x00" {
            return Err(BreachError::load(format!(
                "unsupported version: {:?}",
                version
            )));
        }

        Ok(())
    }

    /// Validate and compile a module
    ///
    /// # Errors
    ///
    /// Returns `LoadFailure` if validation or compilation fails
    pub fn compile(&self, engine: &Engine, wasm_bytes: &[u8]) -> BreachResult<Module> {
        self.validate(wasm_bytes)?;
        let module = Module::new(engine, wasm_bytes).map_err(BreachError::load)?;
        debug!(
            size = wasm_bytes.len(),
            imports = module.imports().len(),
            exports = module.exports().len(),
            "compiled oracle module"
        );
        Ok(module)
    }

    /// Check that the only import is the `i32 -> i32` probe.
    ///
    /// Returns whether the module imports the probe at all; a module that
    /// never calls it still works but yields no side channel.
    ///
    /// # Errors
    ///
    /// Returns `LoadFailure` on any other import or a mistyped probe
    pub fn check_imports(&self, module: &Module, config: &OracleConfig) -> BreachResult<bool> {
        let mut found = false;
        for import in module.imports() {
            if import.module() != config.import_module || import.name() != config.import_name {
                return Err(BreachError::load(format!(
                    "unsupported import {}::{}",
                    import.module(),
                    import.name()
                )));
            }
            let ExternType::Func(ty) = import.ty() else {
                return Err(BreachError::load(format!(
                    "import {}::{} is not a function",
                    import.module(),
                    import.name()
                )));
            };
            let params: Vec<ValType> = ty.params().collect();
            let results: Vec<ValType> = ty.results().collect();
            let is_probe = matches!(params.as_slice(), [ValType::I32])
                && matches!(results.as_slice(), [ValType::I32]);
            if !is_probe {
                return Err(BreachError::load(format!(
                    "import {}::{} must have type (i32) -> i32",
                    import.module(),
                    import.name()
                )));
            }
            found = true;
        }
        Ok(found)
    }
}

/// blake3 fingerprint of module bytes, hex encoded
#[must_use]
pub fn fingerprint(wasm_bytes: &[u8]) -> String {
    blake3::hash(wasm_bytes).to_hex().to_string()
}
