//! Run harness: set aside local changes, stage, loop, restore.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use next_evals_core::{
    emit_eval_finished, emit_eval_started, emit_teardown_error, eval_span, stage_case,
    write_attempt_log, AttemptLog, AttemptOutcome, AttemptRecord, CodingAgent, EvalCase,
    FinalState, LoadedEval, Monitor, MonitorHandle, RunMode, WorkingTree,
};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::attempt::{AttemptLoop, AttemptState};
use crate::verify::Verifier;

/// Per-invocation run settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessSettings {
    pub mode: RunMode,
    pub max_attempts: u32,

    /// Where to write attempt logs, if anywhere.
    pub artifacts_dir: Option<PathBuf>,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            mode: RunMode::SingleShot,
            max_attempts: 3,
            artifacts_dir: None,
        }
    }
}

/// Runs evaluations against a single working tree, one at a time.
pub struct Harness {
    agent: Arc<dyn CodingAgent>,
    verifier: Arc<dyn Verifier>,
    tree: Arc<dyn WorkingTree>,
    monitor: Option<Arc<dyn Monitor>>,
    settings: HarnessSettings,
}

impl Harness {
    pub fn new(
        agent: Arc<dyn CodingAgent>,
        verifier: Arc<dyn Verifier>,
        tree: Arc<dyn WorkingTree>,
        settings: HarnessSettings,
    ) -> Self {
        Self {
            agent,
            verifier,
            tree,
            monitor: None,
            settings,
        }
    }

    /// Dev-server monitor started for retry-with-feedback runs.
    pub fn with_monitor(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn settings(&self) -> &HarnessSettings {
        &self.settings
    }

    /// Run every case in order; a faulted run never stops the batch.
    pub async fn run_batch(&self, cases: &[EvalCase]) -> Vec<AttemptOutcome> {
        let mut outcomes = Vec::with_capacity(cases.len());
        for case in cases {
            outcomes.push(self.run_eval(case).await);
        }
        outcomes
    }

    /// Run every loaded eval in order.
    ///
    /// An eval that failed to load still yields exactly one outcome, carrying
    /// the load error; the rest of the batch runs.
    pub async fn run_loaded(&self, evals: &[LoadedEval]) -> Vec<AttemptOutcome> {
        let mut outcomes = Vec::with_capacity(evals.len());
        for loaded in evals {
            match &loaded.case {
                Ok(case) => outcomes.push(self.run_eval(case).await),
                Err(e) => {
                    warn!(eval = %loaded.id, error = %e, "Eval failed to load");
                    let mut outcome = AttemptOutcome::new(&loaded.id, self.settings.mode);
                    outcome.record_error(format!("failed to load eval: {e}"));
                    outcomes.push(outcome);
                }
            }
        }
        outcomes
    }

    /// Run one evaluation and return its outcome.
    ///
    /// Faults are recorded on the outcome rather than returned. The working
    /// tree is restored on every path once its local changes were set aside.
    pub async fn run_eval(&self, case: &EvalCase) -> AttemptOutcome {
        let run_id = Uuid::new_v4().to_string();
        let span = eval_span(&run_id, &case.id);
        self.run_in_span(case, &run_id).instrument(span).await
    }

    async fn run_in_span(&self, case: &EvalCase, run_id: &str) -> AttemptOutcome {
        let started = Instant::now();
        let mode = self.settings.mode;
        let budget = mode.attempt_budget(self.settings.max_attempts);
        emit_eval_started(&case.id, mode.as_str(), budget);

        let mut outcome = AttemptOutcome::new(&case.id, mode);
        let mut log = AttemptLog::new(run_id, &case.id, mode, budget);
        let work_dir = self.tree.root().to_path_buf();

        match self.tree.set_aside() {
            Ok(baseline) => {
                let state = self
                    .stage_and_attempt(case, &work_dir, budget, &mut outcome, &mut log.attempts)
                    .await;
                log.final_state = state.final_state().unwrap_or(FinalState::Faulted);

                if let Err(e) = self.tree.restore(&baseline) {
                    emit_teardown_error("restore", &e);
                }
            }
            Err(e) => {
                // Nothing was set aside, so restoring would discard the user's changes.
                outcome.record_error(format!("failed to set aside local changes: {e}"));
                log.final_state = FinalState::Faulted;
            }
        }

        outcome.finish(started.elapsed());
        log.error = outcome.error.clone();

        emit_eval_finished(
            &case.id,
            outcome.success(),
            outcome.attempts,
            outcome.elapsed.as_millis() as u64,
        );

        if let Some(dir) = &self.settings.artifacts_dir {
            match write_attempt_log(&log, dir) {
                Ok(path) => info!(path = %path.display(), "Wrote attempt log"),
                Err(e) => warn!(error = %e, "Failed to write attempt log"),
            }
        }

        outcome
    }

    async fn stage_and_attempt(
        &self,
        case: &EvalCase,
        work_dir: &Path,
        budget: u32,
        outcome: &mut AttemptOutcome,
        records: &mut Vec<AttemptRecord>,
    ) -> AttemptState {
        let staging = match stage_case(case, work_dir) {
            Ok(report) => report,
            Err(e) => {
                outcome.record_error(format!("staging failed: {e}"));
                return AttemptState::Staged.fault();
            }
        };
        info!(
            written = staging.written.len(),
            skipped = staging.skipped.len(),
            test_files = staging.test_files,
            "Staged eval inputs"
        );

        let mut handle: Option<Box<dyn MonitorHandle>> = None;
        if self.settings.mode == RunMode::RetryWithFeedback {
            if let Some(monitor) = &self.monitor {
                match monitor.start(work_dir).await {
                    Ok(started) => handle = Some(started),
                    Err(e) => {
                        outcome.record_error(format!("dev server failed to start: {e}"));
                        return AttemptState::Staged.fault();
                    }
                }
            }
        }

        let attempts = AttemptLoop {
            agent: self.agent.as_ref(),
            verifier: self.verifier.as_ref(),
            work_dir,
            budget,
            run_tests: staging.has_tests(),
        };
        let state = attempts.run(case, handle.as_mut(), outcome, records).await;

        if let Some(handle) = handle {
            if let Err(e) = handle.stop().await {
                emit_teardown_error("monitor.stop", &e);
            }
        }

        state
    }
}
