//! Discovery and staging over an on-disk evals directory.

use std::fs;
use std::path::{Path, PathBuf};

use next_evals_core::{stage_case, EvalCatalog, EvalError, FileKind};

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn make_evals() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write(&root.join("001-hello/prompt.md"), "Render hello.\n");

    write(&root.join("003-add-route/prompt.md"), "Add /api/hello.\n");
    write(
        &root.join("003-add-route/input/app/api/hello/route.ts"),
        "// stub\n",
    );
    write(
        &root.join("003-add-route/input/app/api/hello/route.test.ts"),
        "test('ok', () => {})\n",
    );
    write(
        &root.join("003-add-route/input/__tests__/page.tsx"),
        "// fixture\n",
    );

    // Not an eval: no prompt.md.
    fs::create_dir_all(root.join("shared")).unwrap();
    dir
}

#[test]
fn test_catalog_lists_sorted_evals_only() {
    let evals = make_evals();
    let catalog = EvalCatalog::discover(evals.path()).unwrap();
    assert_eq!(catalog.ids(), &["001-hello", "003-add-route"]);
}

#[test]
fn test_prefix_resolution() {
    let evals = make_evals();
    write(&evals.path().join("003-edit-page/prompt.md"), "Edit.\n");
    let catalog = EvalCatalog::discover(evals.path()).unwrap();

    assert_eq!(catalog.resolve("001").unwrap(), "001-hello");
    assert_eq!(catalog.resolve("003-add").unwrap(), "003-add-route");
    assert!(matches!(
        catalog.resolve("003"),
        Err(EvalError::AmbiguousEval { .. })
    ));
    assert!(matches!(
        catalog.resolve("404"),
        Err(EvalError::EvalNotFound(_))
    ));
}

#[test]
fn test_inputs_classified() {
    let evals = make_evals();
    let catalog = EvalCatalog::discover(evals.path()).unwrap();
    let case = catalog.load("003-add-route").unwrap();

    let kinds: Vec<(PathBuf, FileKind)> = case
        .inputs
        .iter()
        .map(|f| (f.relative.clone(), f.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (PathBuf::from("__tests__/page.tsx"), FileKind::Test),
            (PathBuf::from("app/api/hello/route.test.ts"), FileKind::Test),
            (PathBuf::from("app/api/hello/route.ts"), FileKind::Stub),
        ]
    );
    assert!(case.has_tests());
    assert!(!catalog.load("001-hello").unwrap().has_tests());
}

#[test]
fn test_staging_keeps_existing_sources_and_overwrites_tests() {
    let evals = make_evals();
    let project = tempfile::tempdir().unwrap();
    write(
        &project.path().join("app/api/hello/route.ts"),
        "// existing\n",
    );
    write(
        &project.path().join("app/api/hello/route.test.ts"),
        "// old test\n",
    );

    let case = EvalCatalog::discover(evals.path())
        .unwrap()
        .load("003-add-route")
        .unwrap();
    let report = stage_case(&case, project.path()).unwrap();

    assert_eq!(report.test_files, 2);
    assert_eq!(report.skipped, vec![PathBuf::from("app/api/hello/route.ts")]);
    assert_eq!(
        fs::read_to_string(project.path().join("app/api/hello/route.ts")).unwrap(),
        "// existing\n"
    );
    assert_eq!(
        fs::read_to_string(project.path().join("app/api/hello/route.test.ts")).unwrap(),
        "test('ok', () => {})\n"
    );
    assert!(project.path().join("__tests__/page.tsx").exists());
}
