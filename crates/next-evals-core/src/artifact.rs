//! Auditable per-run attempt logs.
//!
//! A run can persist `<dir>/<eval>/attempts.json` next to
//! `<dir>/<eval>/attempts.digest` (SHA-256 hex of the JSON bytes). Reading
//! verifies the digest before deserializing.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::error::{EvalError, Result};
use crate::domain::outcome::RunMode;
use crate::feedback::Feedback;

pub const ATTEMPTS_FILE: &str = "attempts.json";
pub const DIGEST_FILE: &str = "attempts.digest";

/// Verdict of one gate within an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateEntry {
    pub gate: String,
    pub status: String,
    pub duration_ms: u64,
}

/// One attempt in the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub agent_exit_code: Option<i32>,
    pub gates: Vec<GateEntry>,
    pub passed: bool,

    /// Feedback included in this attempt's prompt.
    pub feedback_in: Option<Feedback>,
}

/// How the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalState {
    Succeeded,
    Exhausted,
    Faulted,
}

/// Full attempt timeline for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptLog {
    pub run_id: String,
    pub eval: String,
    pub mode: RunMode,
    pub attempt_budget: u32,
    pub attempts: Vec<AttemptRecord>,
    pub final_state: FinalState,
    pub error: Option<String>,
    pub evaluated_at: DateTime<Utc>,
}

impl AttemptLog {
    pub fn new(
        run_id: impl Into<String>,
        eval: impl Into<String>,
        mode: RunMode,
        budget: u32,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            eval: eval.into(),
            mode,
            attempt_budget: budget,
            attempts: Vec::new(),
            final_state: FinalState::Faulted,
            error: None,
            evaluated_at: Utc::now(),
        }
    }
}

fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Persist `<dir>/<eval>/attempts.json` and its digest.
pub fn write_attempt_log(log: &AttemptLog, dir: &Path) -> Result<PathBuf> {
    let eval_dir = dir.join(&log.eval);
    std::fs::create_dir_all(&eval_dir)?;

    let artifact_path = eval_dir.join(ATTEMPTS_FILE);
    let json = serde_json::to_vec_pretty(log)?;

    std::fs::write(&artifact_path, &json)?;
    std::fs::write(eval_dir.join(DIGEST_FILE), digest_hex(&json).as_bytes())?;

    Ok(artifact_path)
}

/// Read and verify `<dir>/<eval>/attempts.json`.
pub fn read_attempt_log(eval: &str, dir: &Path) -> Result<AttemptLog> {
    let eval_dir = dir.join(eval);
    let json = std::fs::read(eval_dir.join(ATTEMPTS_FILE))?;
    let expected = std::fs::read_to_string(eval_dir.join(DIGEST_FILE))?;
    let actual = digest_hex(&json);
    if expected.trim() != actual {
        return Err(EvalError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual,
        });
    }

    Ok(serde_json::from_slice(&json)?)
}
