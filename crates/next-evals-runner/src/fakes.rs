//! Scripted verifier for tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::verify::{VerificationReport, Verifier};

/// Verifier that returns queued reports in order.
///
/// Once the queue is empty the last report is repeated; with nothing queued
/// every gate passes.
#[derive(Debug, Default)]
pub struct ScriptedVerifier {
    reports: Mutex<VecDeque<VerificationReport>>,
    last: Mutex<Option<VerificationReport>>,
    run_tests: Mutex<Vec<bool>>,
    fail: bool,
}

impl ScriptedVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, report: VerificationReport) -> Self {
        self.reports.lock().unwrap().push_back(report);
        self
    }

    /// Queue a report where each gate simply passes or fails.
    pub fn then_flags(self, build: bool, lint: bool, tests: bool) -> Self {
        self.then(VerificationReport::from_flags(build, lint, tests))
    }

    /// Every call returns an error.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.run_tests.lock().unwrap().len()
    }

    /// `run_tests` argument of every call, in order.
    pub fn run_tests_flags(&self) -> Vec<bool> {
        self.run_tests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Verifier for ScriptedVerifier {
    async fn verify(
        &self,
        _work_dir: &Path,
        run_tests: bool,
    ) -> anyhow::Result<VerificationReport> {
        self.run_tests.lock().unwrap().push(run_tests);
        if self.fail {
            anyhow::bail!("scripted verifier failure");
        }

        let mut last = self.last.lock().unwrap();
        let report = match self.reports.lock().unwrap().pop_front() {
            Some(report) => report,
            None => last
                .clone()
                .unwrap_or_else(|| VerificationReport::from_flags(true, true, true)),
        };
        *last = Some(report.clone());
        Ok(report)
    }
}
