//! next-evals runner - gated attempt loop over a working tree
//!
//! Provides the orchestration layer that:
//! - Runs the build, lint and test gates with timeouts
//! - Drives the bounded attempt-and-retry loop with feedback
//! - Stages eval inputs and restores the working tree after every run

pub mod attempt;
pub mod fakes;
pub mod gate;
pub mod harness;
pub mod runner;
pub mod verify;

// Re-export key types
pub use attempt::{feedback_from, AttemptLoop, AttemptState};
pub use gate::{Gate, GateConfig, GatePolicy, GateSet};
pub use harness::{Harness, HarnessSettings};
pub use runner::{CommandResult, CommandRunner};
pub use verify::{CommandVerifier, GateResult, GateStatus, VerificationReport, Verifier};
