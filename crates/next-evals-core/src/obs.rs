//! Structured observability hooks for the eval run lifecycle.
//!
//! Every run executes inside an [`eval_span`]; the `emit_*` helpers log the
//! key transitions as `event = "..."` fields so JSON logs can be filtered.

use tracing::{info, warn, Span};

/// Span tagging everything logged during one evaluation run.
///
/// Attach with `tracing::Instrument::instrument` on the run future.
pub fn eval_span(run_id: &str, eval: &str) -> Span {
    tracing::info_span!("next_evals.run", run_id = %run_id, eval = %eval)
}

/// Emit event: evaluation run started.
pub fn emit_eval_started(eval: &str, mode: &str, max_attempts: u32) {
    info!(event = "eval.started", eval = %eval, mode = %mode, max_attempts = max_attempts);
}

/// Emit event: attempt `attempt` of `budget` begins.
pub fn emit_attempt_started(attempt: u32, budget: u32, with_feedback: bool) {
    info!(
        event = "attempt.started",
        attempt = attempt,
        budget = budget,
        with_feedback = with_feedback,
    );
}

/// Emit event: one gate finished.
pub fn emit_gate_finished(gate: &str, status: &str, duration_ms: u64) {
    info!(event = "gate.finished", gate = %gate, status = %status, duration_ms = duration_ms);
}

/// Emit event: attempt finished with its overall verdict.
pub fn emit_attempt_finished(attempt: u32, passed: bool, failing_gate: Option<&str>) {
    info!(
        event = "attempt.finished",
        attempt = attempt,
        passed = passed,
        failing_gate = failing_gate.unwrap_or("-"),
    );
}

/// Emit event: evaluation run finished.
pub fn emit_eval_finished(eval: &str, success: bool, attempts: u32, duration_ms: u64) {
    info!(
        event = "eval.finished",
        eval = %eval,
        success = success,
        attempts = attempts,
        duration_ms = duration_ms,
    );
}

/// Emit event: a teardown step failed (warning level, never raised).
pub fn emit_teardown_error(step: &str, error: &dyn std::fmt::Display) {
    warn!(event = "teardown.error", step = %step, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn eval_started_logs_mode() {
        emit_eval_started("003-add-route", "single-shot", 1);
        assert!(logs_contain("eval.started"));
        assert!(logs_contain("single-shot"));
    }

    #[traced_test]
    #[test]
    fn attempt_finished_logs_failing_gate() {
        emit_attempt_finished(2, false, Some("lint"));
        assert!(logs_contain("attempt.finished"));
        assert!(logs_contain("lint"));
    }

    #[traced_test]
    #[test]
    fn teardown_error_is_warning() {
        emit_teardown_error("restore", &"git reset failed");
        assert!(logs_contain("WARN"));
        assert!(logs_contain("git reset failed"));
    }

    #[traced_test]
    #[test]
    fn span_fields_are_attached() {
        let span = eval_span("run-1", "001-hello");
        let _entered = span.enter();
        emit_gate_finished("build", "passed", 12);
        assert!(logs_contain("run-1"));
        assert!(logs_contain("gate.finished"));
    }
}
