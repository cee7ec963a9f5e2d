//! Oracle layout configuration.
//!
//! Export names, the probe import and the input region are properties of a
//! particular oracle build, so they are configuration rather than constants.

use breach_core::{BreachError, BreachResult};
use serde::{Deserialize, Serialize};

/// Oracle configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Exported linear memory holding the input region
    pub memory_export: String,
    /// Exported zero-argument entry point returning the verdict
    pub entry_export: String,
    /// Module name of the host probe import
    pub import_module: String,
    /// Field name of the host probe import
    pub import_name: String,
    /// Byte offset of the input region in linear memory
    pub input_offset: usize,
    /// Input region size in bytes, terminator included
    pub capacity: usize,
    /// Fuel granted to each invocation, `None` disables metering
    pub fuel_per_call: Option<u64>,
    /// Largest module accepted by the loader
    pub max_module_size: usize,
    /// Keep the argument of every probe call for diagnostics
    pub record_probe_calls: bool,
}

impl OracleConfig {
    /// Create a new oracle config
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory_export: "memory".to_string(),
            entry_export: "unlock".to_string(),
            import_module: "env".to_string(),
            import_name: "x".to_string(),
            input_offset: 0,
            capacity: 256,
            fuel_per_call: None,
            max_module_size: 10 * 1024 * 1024, // 10MB
            record_probe_calls: false,
        }
    }

    /// Set the memory export name
    #[must_use]
    pub fn with_memory_export(mut self, name: impl Into<String>) -> Self {
        self.memory_export = name.into();
        self
    }

    /// Set the entry point export name
    #[must_use]
    pub fn with_entry_export(mut self, name: impl Into<String>) -> Self {
        self.entry_export = name.into();
        self
    }

    /// Set the probe import module and field
    #[must_use]
    pub fn with_import(mut self, module: impl Into<String>, name: impl Into<String>) -> Self {
        self.import_module = module.into();
        self.import_name = name.into();
        self
    }

    /// Set the input region
    #[must_use]
    pub fn with_input_region(mut self, offset: usize, capacity: usize) -> Self {
        self.input_offset = offset;
        self.capacity = capacity;
        self
    }

    /// Set per-call fuel
    #[must_use]
    pub fn with_fuel_per_call(mut self, fuel: Option<u64>) -> Self {
        self.fuel_per_call = fuel;
        self
    }

    /// Set the module size limit
    #[must_use]
    pub fn with_max_module_size(mut self, size: usize) -> Self {
        self.max_module_size = size;
        self
    }

    /// Enable/disable probe call recording
    #[must_use]
    pub fn with_probe_recording(mut self, enable: bool) -> Self {
        self.record_probe_calls = enable;
        self
    }

    /// Parse from JSON; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or the result is invalid
    pub fn from_json(json: &str) -> BreachResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BreachError::config("oracle config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency
    ///
    /// # Errors
    ///
    /// Returns error naming the first invalid field
    pub fn validate(&self) -> BreachResult<()> {
        for (field, value) in [
            ("memory_export", &self.memory_export),
            ("entry_export", &self.entry_export),
            ("import_module", &self.import_module),
            ("import_name", &self.import_name),
        ] {
            if value.is_empty() {
                return Err(BreachError::config(field, "must not be empty"));
            }
        }
        if self.capacity == 0 {
            return Err(BreachError::config(
                "capacity",
                "must hold at least the terminator byte",
            ));
        }
        if self.input_offset.checked_add(self.capacity).is_none() {
            return Err(BreachError::config("input_offset", "region end overflows"));
        }
        if self.fuel_per_call == Some(0) {
            return Err(BreachError::config("fuel_per_call", "must be positive"));
        }
        Ok(())
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self::new()
    }
}
