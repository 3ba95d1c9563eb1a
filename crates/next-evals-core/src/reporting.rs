//! Result reporting: the JSON summary file and the terminal table.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::error::Result;
use crate::domain::outcome::{AttemptOutcome, RunMode};

// ── results.json schema ───────────────────────────────────────────────────

/// Gate verdicts and timing of one eval, as written to the summary file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub success: bool,
    pub build_success: bool,
    pub lint_success: bool,
    pub test_success: bool,
    pub attempts: u32,
    /// Milliseconds.
    pub duration: u64,
    pub error: Option<String>,
}

/// One entry of the summary array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub eval_path: String,
    pub mode: RunMode,
    pub result: ResultRecord,
}

impl From<&AttemptOutcome> for SummaryRecord {
    fn from(outcome: &AttemptOutcome) -> Self {
        Self {
            eval_path: outcome.name.clone(),
            mode: outcome.mode,
            result: ResultRecord {
                success: outcome.success(),
                build_success: outcome.build,
                lint_success: outcome.lint,
                test_success: outcome.tests,
                attempts: outcome.attempts,
                duration: outcome.elapsed.as_millis() as u64,
                error: outcome.error.clone(),
            },
        }
    }
}

/// Write the summary array for `outcomes` to `path` as pretty JSON.
pub fn write_summary_json(outcomes: &[AttemptOutcome], path: &Path) -> Result<()> {
    let records: Vec<SummaryRecord> = outcomes.iter().map(SummaryRecord::from).collect();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(&records)?)?;
    Ok(())
}

// ── terminal output ───────────────────────────────────────────────────────

/// Aggregate pass rates across a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub passed: usize,
    pub build_rate: f32,
    pub lint_rate: f32,
    pub test_rate: f32,
    pub pass_rate: f32,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[AttemptOutcome]) -> Self {
        let total = outcomes.len();
        let rate = |count: usize| {
            if total == 0 {
                0.0
            } else {
                count as f32 / total as f32
            }
        };
        let passed = outcomes.iter().filter(|o| o.success()).count();

        Self {
            total,
            passed,
            build_rate: rate(outcomes.iter().filter(|o| o.build).count()),
            lint_rate: rate(outcomes.iter().filter(|o| o.lint).count()),
            test_rate: rate(outcomes.iter().filter(|o| o.tests).count()),
            pass_rate: rate(passed),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "Build: {:.0}%  Lint: {:.0}%  Tests: {:.0}%  Overall: {}/{} ({:.0}%)",
            self.build_rate * 100.0,
            self.lint_rate * 100.0,
            self.test_rate * 100.0,
            self.passed,
            self.total,
            self.pass_rate * 100.0
        )
    }
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗"
    }
}

/// Render the aggregate results table.
pub fn render_table(outcomes: &[AttemptOutcome]) -> String {
    let name_width = outcomes
        .iter()
        .map(|o| o.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Eval".len());

    let mut out = format!(
        "{:<name_width$}  {:^5}  {:^4}  {:^5}  {:>8}  {:>8}  {}\n",
        "Eval", "Build", "Lint", "Tests", "Attempts", "Time", "Result"
    );
    out.push_str(&format!("{}\n", "-".repeat(name_width + 48)));

    for outcome in outcomes {
        let result = match (&outcome.error, outcome.success()) {
            (Some(err), _) => format!("ERROR: {err}"),
            (None, true) => "PASS".to_string(),
            (None, false) => "FAIL".to_string(),
        };
        out.push_str(&format!(
            "{:<name_width$}  {:^5}  {:^4}  {:^5}  {:>8}  {:>7.1}s  {}\n",
            outcome.name,
            mark(outcome.build),
            mark(outcome.lint),
            mark(outcome.tests),
            outcome.attempts,
            outcome.elapsed.as_secs_f64(),
            result
        ));
    }

    out
}
