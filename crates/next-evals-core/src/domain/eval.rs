//! Evaluation definitions and on-disk discovery.
//!
//! An eval is a directory under the evals root that contains `prompt.md`.
//! Files under its optional `input/` subtree are staged into the project
//! checkout before the agent runs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::error::{EvalError, Result};

/// File holding the base instruction payload.
pub const PROMPT_FILE: &str = "prompt.md";

/// Subdirectory holding files to stage.
pub const INPUT_DIR: &str = "input";

/// How a staged file treats an existing file at its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Test fixture; always written.
    Test,
    /// Starter source; never overwrites an existing file.
    Stub,
}

impl FileKind {
    /// Classify a path relative to the input root.
    pub fn classify(relative: &Path) -> Self {
        let in_tests_dir = relative
            .components()
            .any(|c| c.as_os_str() == "__tests__");
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if in_tests_dir || name.contains(".test.") || name.contains(".spec.") {
            FileKind::Test
        } else {
            FileKind::Stub
        }
    }
}

/// One file to copy into the working tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFile {
    /// Path relative to both the input root and the working tree root.
    pub relative: PathBuf,

    /// Absolute source path inside the eval directory.
    pub source: PathBuf,

    pub kind: FileKind,

    /// File bytes, read at load time. The eval directory may live inside the
    /// working tree and be stashed away before staging.
    pub contents: Vec<u8>,
}

/// A single evaluation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalCase {
    /// Directory name, e.g. `003-add-route`.
    pub id: String,

    /// Eval directory.
    pub root: PathBuf,

    /// Base instruction payload.
    pub prompt: String,

    /// Files to stage, sorted by relative path.
    pub inputs: Vec<StagedFile>,
}

impl EvalCase {
    /// Load an eval from its directory.
    pub fn load(root: &Path) -> Result<Self> {
        let id = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| EvalError::InvalidEval {
                id: root.display().to_string(),
                reason: "eval path has no directory name".to_string(),
            })?;

        let prompt_path = root.join(PROMPT_FILE);
        let prompt = std::fs::read_to_string(&prompt_path).map_err(|source| EvalError::Staging {
            path: prompt_path.clone(),
            source,
        })?;
        if prompt.trim().is_empty() {
            return Err(EvalError::InvalidEval {
                id,
                reason: format!("{PROMPT_FILE} is empty"),
            });
        }

        let input_root = root.join(INPUT_DIR);
        let mut inputs = Vec::new();
        if input_root.is_dir() {
            collect_inputs(&input_root, &input_root, &mut inputs)?;
        }
        inputs.sort_by(|a, b| a.relative.cmp(&b.relative));

        Ok(Self {
            id,
            root: root.to_path_buf(),
            prompt,
            inputs,
        })
    }

    /// Test fixtures in this eval.
    pub fn test_files(&self) -> impl Iterator<Item = &StagedFile> {
        self.inputs.iter().filter(|f| f.kind == FileKind::Test)
    }

    /// Whether the test gate has anything to run.
    pub fn has_tests(&self) -> bool {
        self.test_files().next().is_some()
    }
}

fn collect_inputs(input_root: &Path, dir: &Path, out: &mut Vec<StagedFile>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|source| EvalError::Staging {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_inputs(input_root, &path, out)?;
            continue;
        }

        let relative = path
            .strip_prefix(input_root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(entry.file_name()));
        let kind = FileKind::classify(&relative);
        let contents = std::fs::read(&path).map_err(|source| EvalError::Staging {
            path: path.clone(),
            source,
        })?;
        out.push(StagedFile {
            relative,
            source: path,
            kind,
            contents,
        });
    }

    Ok(())
}

/// The set of evals found under an evals root.
#[derive(Debug, Clone, Default)]
pub struct EvalCatalog {
    root: PathBuf,
    ids: Vec<String>,
}

impl EvalCatalog {
    /// Scan `root` for eval directories (those containing `prompt.md`).
    pub fn discover(root: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(root).map_err(|source| EvalError::Staging {
            path: root.to_path_buf(),
            source,
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() && entry.path().join(PROMPT_FILE).is_file() {
                ids.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        ids.sort();

        Ok(Self {
            root: root.to_path_buf(),
            ids,
        })
    }

    /// Sorted eval identifiers.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Resolve an identifier by exact name, then by unique prefix.
    pub fn resolve(&self, id: &str) -> Result<String> {
        if let Some(exact) = self.ids.iter().find(|candidate| candidate.as_str() == id) {
            return Ok(exact.clone());
        }

        let matches: Vec<String> = self
            .ids
            .iter()
            .filter(|candidate| candidate.starts_with(id))
            .cloned()
            .collect();

        match matches.len() {
            0 => Err(EvalError::EvalNotFound(id.to_string())),
            1 => Ok(matches[0].clone()),
            _ => Err(EvalError::AmbiguousEval {
                id: id.to_string(),
                candidates: matches,
            }),
        }
    }

    /// Resolve and load one eval.
    pub fn load(&self, id: &str) -> Result<EvalCase> {
        let resolved = self.resolve(id)?;
        EvalCase::load(&self.root.join(resolved))
    }

    /// Resolve `id` and load it; only resolution failures are errors.
    pub fn load_one(&self, id: &str) -> Result<LoadedEval> {
        let resolved = self.resolve(id)?;
        let case = EvalCase::load(&self.root.join(&resolved));
        Ok(LoadedEval { id: resolved, case })
    }

    /// Load every eval in sorted order, keeping failures per eval.
    pub fn load_each(&self) -> Vec<LoadedEval> {
        self.ids
            .iter()
            .map(|id| LoadedEval {
                id: id.clone(),
                case: EvalCase::load(&self.root.join(id)),
            })
            .collect()
    }
}

/// A catalog entry after loading; a broken eval keeps its id and error.
#[derive(Debug)]
pub struct LoadedEval {
    pub id: String,
    pub case: Result<EvalCase>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn make_evals() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("001-hello/prompt.md"), "Add a hello page.");
        write(&root.join("003-add-route/prompt.md"), "Add an API route.");
        write(
            &root.join("003-add-route/input/app/api/route.test.ts"),
            "test('route', () => {})",
        );
        write(
            &root.join("003-add-route/input/app/api/route.ts"),
            "export {}",
        );
        write(&root.join("notes/README.md"), "not an eval");
        dir
    }

    #[test]
    fn file_kind_classification() {
        assert_eq!(
            FileKind::classify(Path::new("app/page.test.tsx")),
            FileKind::Test
        );
        assert_eq!(
            FileKind::classify(Path::new("lib/util.spec.ts")),
            FileKind::Test
        );
        assert_eq!(
            FileKind::classify(Path::new("__tests__/page.tsx")),
            FileKind::Test
        );
        assert_eq!(FileKind::classify(Path::new("app/page.tsx")), FileKind::Stub);
        assert_eq!(
            FileKind::classify(Path::new("app/testing.tsx")),
            FileKind::Stub
        );
    }

    #[test]
    fn discover_lists_only_dirs_with_prompt() {
        let dir = make_evals();
        let catalog = EvalCatalog::discover(dir.path()).unwrap();
        assert_eq!(catalog.ids(), &["001-hello", "003-add-route"]);
    }

    #[test]
    fn resolve_exact_and_prefix() {
        let dir = make_evals();
        let catalog = EvalCatalog::discover(dir.path()).unwrap();
        assert_eq!(catalog.resolve("003-add-route").unwrap(), "003-add-route");
        assert_eq!(catalog.resolve("003").unwrap(), "003-add-route");
        assert!(matches!(
            catalog.resolve("999"),
            Err(EvalError::EvalNotFound(_))
        ));
        assert!(matches!(
            catalog.resolve("00"),
            Err(EvalError::AmbiguousEval { .. })
        ));
    }

    #[test]
    fn load_collects_inputs_with_kinds() {
        let dir = make_evals();
        let catalog = EvalCatalog::discover(dir.path()).unwrap();
        let case = catalog.load("003").unwrap();

        assert_eq!(case.id, "003-add-route");
        assert_eq!(case.prompt, "Add an API route.");
        assert_eq!(case.inputs.len(), 2);
        assert_eq!(case.inputs[0].relative, PathBuf::from("app/api/route.test.ts"));
        assert_eq!(case.inputs[0].kind, FileKind::Test);
        assert_eq!(case.inputs[1].kind, FileKind::Stub);
        assert!(case.has_tests());
    }

    #[test]
    fn eval_without_inputs_has_no_tests() {
        let dir = make_evals();
        let catalog = EvalCatalog::discover(dir.path()).unwrap();
        let case = catalog.load("001-hello").unwrap();
        assert!(case.inputs.is_empty());
        assert!(!case.has_tests());
    }

    #[test]
    fn load_each_keeps_broken_evals() {
        let dir = make_evals();
        write(&dir.path().join("002-empty/prompt.md"), "  \n");
        let catalog = EvalCatalog::discover(dir.path()).unwrap();

        let loaded = catalog.load_each();
        let ids: Vec<&str> = loaded.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["001-hello", "002-empty", "003-add-route"]);
        assert!(loaded[0].case.is_ok());
        assert!(matches!(
            loaded[1].case,
            Err(EvalError::InvalidEval { .. })
        ));
        assert!(loaded[2].case.is_ok());
    }

    #[test]
    fn load_one_resolves_prefix_and_reports_unknown() {
        let dir = make_evals();
        let catalog = EvalCatalog::discover(dir.path()).unwrap();
        let loaded = catalog.load_one("003").unwrap();
        assert_eq!(loaded.id, "003-add-route");
        assert!(loaded.case.is_ok());
        assert!(catalog.load_one("999").is_err());
    }

    #[test]
    fn empty_prompt_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("002-empty/prompt.md"), "  \n");
        let err = EvalCase::load(&dir.path().join("002-empty")).unwrap_err();
        assert!(matches!(err, EvalError::InvalidEval { .. }));
    }
}
