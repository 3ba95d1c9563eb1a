//! Per-run outcome record.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How many attempts a run may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// One agent invocation, no feedback, no dev server.
    SingleShot,
    /// Up to the configured maximum, with gate and runtime feedback.
    RetryWithFeedback,
}

impl RunMode {
    /// Attempt budget for this mode given the configured maximum.
    pub fn attempt_budget(&self, max_attempts: u32) -> u32 {
        match self {
            RunMode::SingleShot => 1,
            RunMode::RetryWithFeedback => max_attempts.max(1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::SingleShot => "single-shot",
            RunMode::RetryWithFeedback => "retry-with-feedback",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one evaluation run.
///
/// Created when the run starts, updated after every verification pass and
/// stamped with the elapsed time when the run ends.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    /// Eval identifier.
    pub name: String,

    pub build: bool,
    pub lint: bool,
    pub tests: bool,

    /// Attempts consumed, always at least one.
    pub attempts: u32,

    pub elapsed: Duration,

    pub mode: RunMode,

    /// Infrastructure fault, if the run did not complete normally.
    pub error: Option<String>,
}

impl AttemptOutcome {
    pub fn new(name: impl Into<String>, mode: RunMode) -> Self {
        Self {
            name: name.into(),
            build: false,
            lint: false,
            tests: false,
            attempts: 1,
            elapsed: Duration::ZERO,
            mode,
            error: None,
        }
    }

    /// All gates passed and no fault was recorded.
    pub fn success(&self) -> bool {
        self.build && self.lint && self.tests && self.error.is_none()
    }

    /// Record the gate verdicts of the latest verification pass.
    pub fn record_gates(&mut self, attempt: u32, build: bool, lint: bool, tests: bool) {
        self.attempts = attempt.max(1);
        self.build = build;
        self.lint = lint;
        self.tests = tests;
    }

    /// Record a fault; later faults do not replace the first one.
    pub fn record_error(&mut self, error: impl fmt::Display) {
        if self.error.is_none() {
            self.error = Some(error.to_string());
        }
    }

    pub fn finish(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }
}
