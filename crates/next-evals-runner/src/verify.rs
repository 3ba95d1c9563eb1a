//! Verification pass: build, lint and test gates over the working tree.

use crate::gate::{Gate, GatePolicy, GateSet};
use crate::runner::CommandRunner;
use async_trait::async_trait;
use next_evals_core::{emit_gate_finished, GateEntry};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Outcome of one gate within a verification pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Passed,
    Failed,
    /// Test gate with no staged tests; counts as passed.
    Skipped,
    /// Not executed because an earlier gate failed; counts as failed.
    NotRun,
}

impl GateStatus {
    pub fn counts_as_passed(&self) -> bool {
        matches!(self, GateStatus::Passed | GateStatus::Skipped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GateStatus::Passed => "passed",
            GateStatus::Failed => "failed",
            GateStatus::Skipped => "skipped",
            GateStatus::NotRun => "not_run",
        }
    }
}

/// Result of one gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResult {
    pub gate: Gate,
    pub status: GateStatus,

    /// Captured output; for failures this is the feedback text.
    pub output: String,

    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

impl GateResult {
    pub fn passed(gate: Gate) -> Self {
        Self::with_status(gate, GateStatus::Passed, String::new())
    }

    pub fn failed(gate: Gate, output: impl Into<String>) -> Self {
        Self::with_status(gate, GateStatus::Failed, output.into())
    }

    pub fn skipped(gate: Gate) -> Self {
        Self::with_status(gate, GateStatus::Skipped, String::new())
    }

    pub fn not_run(gate: Gate) -> Self {
        Self::with_status(gate, GateStatus::NotRun, String::new())
    }

    fn with_status(gate: Gate, status: GateStatus, output: String) -> Self {
        Self {
            gate,
            status,
            output,
            exit_code: None,
            duration_ms: 0,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status.counts_as_passed()
    }

    pub fn to_entry(&self) -> GateEntry {
        GateEntry {
            gate: self.gate.name().to_string(),
            status: self.status.as_str().to_string(),
            duration_ms: self.duration_ms,
        }
    }
}

/// Results of all three gates for one attempt, in gate order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub gates: Vec<GateResult>,
}

impl VerificationReport {
    pub fn new(gates: Vec<GateResult>) -> Self {
        Self { gates }
    }

    /// Shorthand for a report where each gate simply passed or failed.
    pub fn from_flags(build: bool, lint: bool, tests: bool) -> Self {
        let result = |gate: Gate, ok: bool| {
            if ok {
                GateResult::passed(gate)
            } else {
                GateResult::failed(gate, format!("{gate} failed"))
            }
        };
        Self::new(vec![
            result(Gate::Build, build),
            result(Gate::Lint, lint),
            result(Gate::Test, tests),
        ])
    }

    pub fn result(&self, gate: Gate) -> Option<&GateResult> {
        self.gates.iter().find(|r| r.gate == gate)
    }

    /// Whether `gate` passed; a missing gate counts as failed.
    pub fn gate_passed(&self, gate: Gate) -> bool {
        self.result(gate).map(GateResult::is_pass).unwrap_or(false)
    }

    pub fn all_passed(&self) -> bool {
        Gate::ORDER.iter().all(|gate| self.gate_passed(*gate))
    }

    /// First gate, in build -> lint -> test order, that failed.
    pub fn first_failure(&self) -> Option<&GateResult> {
        Gate::ORDER
            .iter()
            .filter_map(|gate| self.result(*gate))
            .find(|r| r.status == GateStatus::Failed)
    }
}

/// Runs the verification gates against a working tree.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Verify `work_dir`; the test gate is skipped when `run_tests` is false.
    async fn verify(&self, work_dir: &Path, run_tests: bool) -> anyhow::Result<VerificationReport>;
}

/// [`Verifier`] that executes the configured gate commands.
#[derive(Debug, Clone, Default)]
pub struct CommandVerifier {
    gates: GateSet,
    policy: GatePolicy,
}

impl CommandVerifier {
    pub fn new(gates: GateSet, policy: GatePolicy) -> Self {
        Self { gates, policy }
    }
}

#[async_trait]
impl Verifier for CommandVerifier {
    async fn verify(&self, work_dir: &Path, run_tests: bool) -> anyhow::Result<VerificationReport> {
        let mut results = Vec::with_capacity(Gate::ORDER.len());
        let mut failed = false;

        for gate in Gate::ORDER {
            let result = if gate == Gate::Test && !run_tests {
                info!(gate = %gate, "No test files staged; skipping test gate");
                GateResult::skipped(gate)
            } else if failed && self.policy == GatePolicy::StopOnFirstFailure {
                GateResult::not_run(gate)
            } else {
                let config = self.gates.get(gate);
                info!(gate = %gate, command = %config.command_line(), "Running gate");

                // Launch failures and timeouts count as gate failures.
                match CommandRunner::execute(config, work_dir).await {
                    Ok(run) => GateResult {
                        gate,
                        status: if run.passed() {
                            GateStatus::Passed
                        } else {
                            GateStatus::Failed
                        },
                        output: run.combined_output(),
                        exit_code: Some(run.exit_code),
                        duration_ms: run.duration_ms,
                    },
                    Err(e) => {
                        warn!(gate = %gate, error = %e, "Gate execution error");
                        GateResult::failed(gate, e.to_string())
                    }
                }
            };

            if result.status == GateStatus::Failed {
                failed = true;
            }
            emit_gate_finished(gate.name(), result.status.as_str(), result.duration_ms);
            results.push(result);
        }

        Ok(VerificationReport::new(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateConfig;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn gates(build: &[&str], lint: &[&str], test: &[&str]) -> GateSet {
        GateSet {
            build: GateConfig::new(Gate::Build, cmd(build), 60),
            lint: GateConfig::new(Gate::Lint, cmd(lint), 60),
            test: GateConfig::new(Gate::Test, cmd(test), 60),
        }
    }

    #[test]
    fn first_failure_follows_gate_order() {
        let report = VerificationReport::new(vec![
            GateResult::passed(Gate::Build),
            GateResult::failed(Gate::Lint, "lint broke"),
            GateResult::failed(Gate::Test, "tests broke"),
        ]);
        assert!(!report.all_passed());
        assert_eq!(report.first_failure().unwrap().gate, Gate::Lint);
        assert_eq!(report.first_failure().unwrap().output, "lint broke");
    }

    #[test]
    fn skipped_counts_as_passed_not_run_as_failed() {
        let report = VerificationReport::new(vec![
            GateResult::passed(Gate::Build),
            GateResult::passed(Gate::Lint),
            GateResult::skipped(Gate::Test),
        ]);
        assert!(report.all_passed());
        assert!(report.first_failure().is_none());

        let report = VerificationReport::new(vec![
            GateResult::failed(Gate::Build, "x"),
            GateResult::not_run(Gate::Lint),
            GateResult::not_run(Gate::Test),
        ]);
        assert!(!report.gate_passed(Gate::Lint));
        assert_eq!(report.first_failure().unwrap().gate, Gate::Build);
    }

    #[tokio::test]
    async fn all_gates_pass() {
        let dir = tempfile::tempdir().unwrap();
        let verifier =
            CommandVerifier::new(gates(&["true"], &["true"], &["true"]), GatePolicy::RunAll);
        let report = verifier.verify(dir.path(), true).await.unwrap();
        assert!(report.all_passed());
        assert_eq!(report.gates.len(), 3);
    }

    #[tokio::test]
    async fn test_gate_skipped_without_tests() {
        let dir = tempfile::tempdir().unwrap();
        // The test command would fail if it ran.
        let verifier =
            CommandVerifier::new(gates(&["true"], &["true"], &["false"]), GatePolicy::RunAll);
        let report = verifier.verify(dir.path(), false).await.unwrap();
        assert_eq!(report.result(Gate::Test).unwrap().status, GateStatus::Skipped);
        assert!(report.all_passed());
    }

    #[tokio::test]
    async fn run_all_continues_after_build_failure() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = CommandVerifier::new(
            gates(&["sh", "-c", "echo 'Type error' >&2; exit 1"], &["true"], &["true"]),
            GatePolicy::RunAll,
        );
        let report = verifier.verify(dir.path(), true).await.unwrap();
        assert_eq!(report.result(Gate::Build).unwrap().status, GateStatus::Failed);
        assert_eq!(report.result(Gate::Build).unwrap().output, "Type error");
        assert_eq!(report.result(Gate::Lint).unwrap().status, GateStatus::Passed);
        assert_eq!(report.result(Gate::Test).unwrap().status, GateStatus::Passed);
    }

    #[tokio::test]
    async fn stop_on_first_failure_skips_later_gates() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = CommandVerifier::new(
            gates(&["false"], &["true"], &["true"]),
            GatePolicy::StopOnFirstFailure,
        );
        let report = verifier.verify(dir.path(), true).await.unwrap();
        assert_eq!(report.result(Gate::Lint).unwrap().status, GateStatus::NotRun);
        assert_eq!(report.result(Gate::Test).unwrap().status, GateStatus::NotRun);
    }

    #[tokio::test]
    async fn spawn_failure_is_gate_failure() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = CommandVerifier::new(
            gates(&["no-such-build-tool"], &["true"], &["true"]),
            GatePolicy::RunAll,
        );
        let report = verifier.verify(dir.path(), true).await.unwrap();
        let build = report.result(Gate::Build).unwrap();
        assert_eq!(build.status, GateStatus::Failed);
        assert!(build.output.contains("failed to spawn"));
    }
}
