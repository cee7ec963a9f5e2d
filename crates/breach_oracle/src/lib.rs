//! BREACH Oracle Adapter
//!
//! Narrow call surface over an opaque decision oracle: clear the input
//! region, write a candidate, invoke the entry point once, read back the
//! verdict and the number of host-probe calls made during that invocation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compile;
pub mod config;
pub mod host;
pub mod memory;
pub mod oracle;
pub mod scripted;
pub mod wasm;

pub use compile::{ModuleLoader, fingerprint};
pub use config::OracleConfig;
pub use host::{FnProbe, HostProbe, Parity, ProbeState, parity};
pub use memory::InputRegion;
pub use oracle::{Evaluation, Oracle};
pub use scripted::FnOracle;
pub use wasm::WasmOracle;
