//! The bounded attempt-and-retry loop.
//!
//! Each attempt composes the prompt (base instructions plus the previous
//! attempt's feedback), invokes the agent, verifies the tree and decides the
//! next state. The loop ends on the first fully passing attempt, when the
//! attempt budget is spent, or on an infrastructure fault.

use std::path::Path;

use chrono::Utc;
use next_evals_core::{
    compose_prompt, emit_attempt_finished, emit_attempt_started, AttemptOutcome, AttemptRecord,
    CodingAgent, EvalCase, Feedback, FinalState, MonitorHandle,
};
use tracing::{debug, info, warn};

use crate::gate::Gate;
use crate::verify::{VerificationReport, Verifier};

/// Named states of the attempt loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Inputs are staged; no attempt has started.
    Staged,
    /// Attempt `n` (1-based) is in progress.
    Attempting(u32),
    Succeeded,
    Exhausted,
    Faulted,
}

impl AttemptState {
    pub fn begin(self) -> Self {
        match self {
            AttemptState::Staged => AttemptState::Attempting(1),
            other => other,
        }
    }

    /// Transition after attempt verification.
    pub fn on_verified(self, passed: bool, budget: u32) -> Self {
        match self {
            AttemptState::Attempting(_) if passed => AttemptState::Succeeded,
            AttemptState::Attempting(n) if n >= budget => AttemptState::Exhausted,
            AttemptState::Attempting(n) => AttemptState::Attempting(n + 1),
            other => other,
        }
    }

    pub fn fault(self) -> Self {
        if self.is_terminal() {
            self
        } else {
            AttemptState::Faulted
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::Succeeded | AttemptState::Exhausted | AttemptState::Faulted
        )
    }

    /// Final state for the attempt log; `None` while still running.
    pub fn final_state(&self) -> Option<FinalState> {
        match self {
            AttemptState::Succeeded => Some(FinalState::Succeeded),
            AttemptState::Exhausted => Some(FinalState::Exhausted),
            AttemptState::Faulted => Some(FinalState::Faulted),
            _ => None,
        }
    }
}

/// Feedback for the next attempt: the first failing gate's output plus any
/// runtime errors drained since the previous attempt.
pub fn feedback_from(
    attempt: u32,
    report: &VerificationReport,
    runtime_errors: Vec<String>,
) -> Feedback {
    let failure = report.first_failure();
    Feedback {
        attempt,
        gate: failure.map(|r| r.gate.name().to_string()),
        gate_output: failure.map(|r| r.output.clone()).unwrap_or_default(),
        runtime_errors,
    }
}

/// Collaborators and limits for one run of the loop.
pub struct AttemptLoop<'a> {
    pub agent: &'a dyn CodingAgent,
    pub verifier: &'a dyn Verifier,
    pub work_dir: &'a Path,
    pub budget: u32,
    pub run_tests: bool,
}

impl AttemptLoop<'_> {
    /// Drive the loop to a terminal state.
    ///
    /// Gate verdicts and faults are recorded on `outcome`; every attempt is
    /// appended to `records`.
    pub async fn run(
        &self,
        case: &EvalCase,
        mut monitor: Option<&mut Box<dyn MonitorHandle>>,
        outcome: &mut AttemptOutcome,
        records: &mut Vec<AttemptRecord>,
    ) -> AttemptState {
        let mut state = AttemptState::Staged.begin();
        let mut feedback: Option<Feedback> = None;

        while let AttemptState::Attempting(attempt) = state {
            emit_attempt_started(attempt, self.budget, feedback.is_some());
            outcome.attempts = attempt;

            let prompt = compose_prompt(&case.prompt, feedback.as_ref());
            let mut record = AttemptRecord {
                attempt,
                started_at: Utc::now(),
                agent_exit_code: None,
                gates: Vec::new(),
                passed: false,
                feedback_in: feedback.take(),
            };

            // A non-zero agent exit is not fatal; the gates decide.
            match self.agent.invoke(&prompt, self.work_dir).await {
                Ok(output) => {
                    debug!(
                        agent = self.agent.name(),
                        exit_code = output.exit_code,
                        duration_ms = output.duration_ms,
                        "Agent finished"
                    );
                    record.agent_exit_code = Some(output.exit_code);
                }
                Err(e) => {
                    outcome.record_error(format!("agent invocation failed: {e}"));
                    records.push(record);
                    state = state.fault();
                    break;
                }
            }

            let report = match self.verifier.verify(self.work_dir, self.run_tests).await {
                Ok(report) => report,
                Err(e) => {
                    outcome.record_error(format!("verification failed: {e}"));
                    records.push(record);
                    state = state.fault();
                    break;
                }
            };

            outcome.record_gates(
                attempt,
                report.gate_passed(Gate::Build),
                report.gate_passed(Gate::Lint),
                report.gate_passed(Gate::Test),
            );

            // Drain every attempt so stale errors never reach a later prompt.
            let runtime_errors = match monitor.as_mut() {
                Some(handle) => handle.take_errors().unwrap_or_else(|e| {
                    warn!(error = %e, "Failed to read dev server log");
                    Vec::new()
                }),
                None => Vec::new(),
            };

            let passed = report.all_passed();
            record.gates = report.gates.iter().map(|r| r.to_entry()).collect();
            record.passed = passed;
            records.push(record);

            let failure = report.first_failure();
            emit_attempt_finished(attempt, passed, failure.map(|r| r.gate.name()));

            state = state.on_verified(passed, self.budget);
            if let AttemptState::Attempting(next) = state {
                info!(next_attempt = next, "Retrying with feedback");
                feedback = Some(feedback_from(attempt, &report, runtime_errors));
            }
        }

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::GateResult;

    #[test]
    fn state_machine_success_path() {
        let state = AttemptState::Staged.begin();
        assert_eq!(state, AttemptState::Attempting(1));
        assert_eq!(state.on_verified(true, 3), AttemptState::Succeeded);
    }

    #[test]
    fn state_machine_retries_until_budget() {
        let mut state = AttemptState::Staged.begin();
        state = state.on_verified(false, 3);
        assert_eq!(state, AttemptState::Attempting(2));
        state = state.on_verified(false, 3);
        assert_eq!(state, AttemptState::Attempting(3));
        state = state.on_verified(false, 3);
        assert_eq!(state, AttemptState::Exhausted);
        assert_eq!(state.final_state(), Some(FinalState::Exhausted));
    }

    #[test]
    fn single_attempt_budget_exhausts_immediately() {
        let state = AttemptState::Staged.begin().on_verified(false, 1);
        assert_eq!(state, AttemptState::Exhausted);
    }

    #[test]
    fn fault_keeps_terminal_states() {
        assert_eq!(AttemptState::Attempting(2).fault(), AttemptState::Faulted);
        assert_eq!(AttemptState::Succeeded.fault(), AttemptState::Succeeded);
        assert!(AttemptState::Faulted.is_terminal());
        assert!(AttemptState::Staged.final_state().is_none());
    }

    #[test]
    fn feedback_uses_first_failing_gate() {
        let report = VerificationReport::new(vec![
            GateResult::passed(Gate::Build),
            GateResult::failed(Gate::Lint, "no-unused-vars"),
            GateResult::failed(Gate::Test, "1 test failed"),
        ]);
        let feedback = feedback_from(1, &report, vec!["TypeError: x".to_string()]);
        assert_eq!(feedback.gate.as_deref(), Some("lint"));
        assert_eq!(feedback.gate_output, "no-unused-vars");
        assert_eq!(feedback.runtime_errors, vec!["TypeError: x"]);
    }
}
