//! next-evals core library
//!
//! Building blocks for evaluating a coding agent against a Next.js project:
//! eval discovery and staging, the git working tree, the agent and dev-server
//! adapters, feedback composition, configuration, and reporting.

pub mod agent;
pub mod artifact;
pub mod config;
pub mod domain;
pub mod fakes;
pub mod feedback;
pub mod git;
pub mod monitor;
pub mod obs;
pub mod reporting;
pub mod staging;
pub mod telemetry;

pub use agent::{AgentOutput, CliAgent, CodingAgent};
pub use artifact::{
    read_attempt_log, write_attempt_log, AttemptLog, AttemptRecord, FinalState, GateEntry,
};
pub use config::{AgentSettings, Config, GateSettings, MonitorSettings, PathSettings, RunSettings};
pub use domain::{
    AttemptOutcome, EvalCase, EvalCatalog, EvalError, FileKind, LoadedEval, Result, RunMode,
    StagedFile,
};
pub use feedback::{compose_prompt, Feedback};
pub use git::{capture_head_sha, is_git_repo, Baseline, GitWorkingTree, WorkingTree};
pub use monitor::{DevServerMonitor, Monitor, MonitorHandle};
pub use obs::{
    emit_attempt_finished, emit_attempt_started, emit_eval_finished, emit_eval_started,
    emit_gate_finished, emit_teardown_error, eval_span,
};
pub use reporting::{render_table, write_summary_json, BatchSummary, SummaryRecord};
pub use staging::{stage_case, StagingReport};
pub use telemetry::init_tracing;
