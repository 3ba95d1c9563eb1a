//! Copy an eval's input files into the working tree.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::error::{EvalError, Result};
use crate::domain::eval::{EvalCase, FileKind};

/// What staging did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingReport {
    /// Relative paths written into the tree.
    pub written: Vec<PathBuf>,

    /// Stub paths left alone because the tree already had them.
    pub skipped: Vec<PathBuf>,

    /// Number of test fixtures written.
    pub test_files: usize,
}

impl StagingReport {
    pub fn has_tests(&self) -> bool {
        self.test_files > 0
    }
}

/// Stage every input of `case` under `work_dir`.
///
/// Test fixtures always overwrite; stubs are skipped when the destination
/// exists.
pub fn stage_case(case: &EvalCase, work_dir: &Path) -> Result<StagingReport> {
    let mut report = StagingReport::default();

    for file in &case.inputs {
        let dest = work_dir.join(&file.relative);

        if file.kind == FileKind::Stub && dest.exists() {
            debug!(path = %file.relative.display(), "Keeping existing file over stub");
            report.skipped.push(file.relative.clone());
            continue;
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|source| EvalError::Staging {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&dest, &file.contents).map_err(|source| EvalError::Staging {
            path: dest.clone(),
            source,
        })?;

        debug!(path = %file.relative.display(), kind = ?file.kind, "Staged file");
        if file.kind == FileKind::Test {
            report.test_files += 1;
        }
        report.written.push(file.relative.clone());
    }

    Ok(report)
}
