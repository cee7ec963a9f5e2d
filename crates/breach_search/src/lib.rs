//! BREACH Search
//!
//! Strategies that reconstruct a secret from an [`Oracle`](breach_oracle::Oracle):
//!
//! - [`ExhaustiveEnumerator`]: every candidate of a finite universe, verdict only
//! - [`GreedyExtender`]: grows a known prefix by the probe-call side channel
//! - [`KnownPlaintextVerifier`]: confirms an out-of-band candidate by
//!   length, affixes and checksum
//!
//! All three implement [`Strategy`] and run under the same [`Driver`],
//! which enforces the invocation budget and produces a [`RunReport`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod candidate;
pub mod config;
pub mod driver;
pub mod exhaustive;
pub mod greedy;
pub mod report;
pub mod strategy;
pub mod verifier;

// Re-exports
pub use candidate::{CandidateSpace, Candidates};
pub use config::RunConfig;
pub use driver::Driver;
pub use exhaustive::ExhaustiveEnumerator;
pub use greedy::GreedyExtender;
pub use report::{Reporter, RoundTrace, RunReport};
pub use strategy::{Observation, Outcome, Proposal, Strategy};
pub use verifier::{KnownPlaintextVerifier, PlaintextChecks, Verification, checksum, xor_repeating};
