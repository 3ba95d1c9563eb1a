//! Domain models for next-evals.
//!
//! - `EvalCase` / `EvalCatalog`: eval definitions discovered on disk
//! - `AttemptOutcome`: the record produced by one evaluation run
//! - `EvalError`: the library error taxonomy

pub mod error;
pub mod eval;
pub mod outcome;

pub use error::{EvalError, Result};
pub use eval::{EvalCase, EvalCatalog, FileKind, LoadedEval, StagedFile};
pub use outcome::{AttemptOutcome, RunMode};
