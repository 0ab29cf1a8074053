//! Integration tests for the generation workflow
//!
//! Drives a full run against a scripted backend:
//! - Manifest fallback on an unparsable architect answer
//! - Five stage artifacts plus the generation summary
//! - Approval on the first review, or exhaustion of the review budget
//! - An empty staging area afterwards

use forge_agent::{RetryPolicy, RetryingInvoker, ScriptedBackend};
use forge_core::{ManifestFallback, ReviewVerdict, Stage};
use forge_orchestrator::prompt::{profile_for, ARCHITECT, REVIEWER};
use forge_orchestrator::{ProjectWorkflow, WorkflowOptions, SUMMARY_FILE};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SPEC: &str = "The application must add two numbers and should handle division by zero.";

/// Helper to build options rooted in a temp directory
fn test_options(root: &Path, max_review_iterations: usize) -> WorkflowOptions {
    WorkflowOptions {
        output_dir: root.join("generated_projects"),
        staging_dir: root.join(".forge/staging"),
        activity_dir: root.join(".forge"),
        spec_file: None,
        max_review_iterations,
        manifest_fallback: ManifestFallback::Fixed,
    }
}

/// Helper to script every stage with a recognisable output
fn scripted(review: &str) -> ScriptedBackend {
    Stage::ORDER
        .iter()
        .fold(ScriptedBackend::new(), |backend, stage| {
            let output = match stage {
                Stage::Implementation => {
                    "```python\ndef add(a, b):\n    return a + b\n```".to_string()
                }
                other => format!("{} for the calculator", other),
            };
            backend.with_default(profile_for(*stage).role, output)
        })
        .with_default(ARCHITECT.role, "I think a single Python file would do nicely.")
        .with_default(REVIEWER.role, review)
}

fn project_dirs(root: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(root.join("generated_projects"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

#[tokio::test]
async fn test_end_to_end_with_default_manifest() {
    let temp_dir = TempDir::new().unwrap();
    let invoker = RetryingInvoker::new(
        scripted("Approved. Clean and simple."),
        RetryPolicy::immediate(5),
    );
    let workflow = ProjectWorkflow::new(invoker, test_options(temp_dir.path(), 1));

    let outcome = workflow.execute(SPEC).await.unwrap();

    assert_eq!(outcome.manifest.implementation_file, "src/app.py");
    assert_eq!(outcome.verdict, Some(ReviewVerdict::Approved));
    assert_eq!(outcome.review_iterations, 1);
    assert_eq!(outcome.files.len(), 5);

    // exactly one project directory holding five artifacts and the summary
    let dirs = project_dirs(temp_dir.path());
    assert_eq!(dirs, vec![outcome.output_dir.clone()]);
    assert_eq!(count_files(&outcome.output_dir), 6);

    let implementation =
        std::fs::read_to_string(outcome.output_dir.join("src/app.py")).unwrap();
    assert_eq!(implementation, "def add(a, b):\n    return a + b\n");
    assert_eq!(
        std::fs::read_to_string(outcome.output_dir.join("src/app.idl")).unwrap(),
        "interface for the calculator"
    );
    for path in ["tests/test_app.py", "docs/README.md", "build_and_run.sh"] {
        assert!(outcome.output_dir.join(path).is_file(), "missing {}", path);
    }

    let summary = std::fs::read_to_string(outcome.output_dir.join(SUMMARY_FILE)).unwrap();
    for path in &outcome.files {
        assert!(summary.contains(&format!("- {}\n", path)));
    }

    // staging is empty
    let staging = temp_dir.path().join(".forge/staging");
    assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);

    // the reviewer saw the staged implementation
    let reviews = workflow.invoker().backend().calls_for(REVIEWER.role);
    assert_eq!(reviews.len(), 1);
    assert!(reviews[0].render_prompt().contains("def add(a, b):"));

    let log = std::fs::read_to_string(temp_dir.path().join(".forge/activity.md")).unwrap();
    assert!(log.contains("## Run Summary"));
}

#[tokio::test]
async fn test_end_to_end_review_exhaustion_still_materializes() {
    let temp_dir = TempDir::new().unwrap();
    let invoker = RetryingInvoker::new(
        scripted("Revisions required: handle overflow"),
        RetryPolicy::immediate(5),
    );
    let workflow = ProjectWorkflow::new(invoker, test_options(temp_dir.path(), 1));

    let outcome = workflow.execute(SPEC).await.unwrap();

    assert_eq!(outcome.verdict, Some(ReviewVerdict::RevisionsRequired));
    assert_eq!(outcome.review_iterations, 1);
    assert_eq!(project_dirs(temp_dir.path()).len(), 1);
    assert_eq!(count_files(&outcome.output_dir), 6);
    assert_eq!(
        workflow
            .invoker()
            .backend()
            .call_count(profile_for(Stage::Implementation).role),
        1
    );
}

#[tokio::test]
async fn test_two_runs_produce_two_directories() {
    let temp_dir = TempDir::new().unwrap();
    let invoker = RetryingInvoker::new(scripted("Approved"), RetryPolicy::immediate(1));
    let workflow = ProjectWorkflow::new(invoker, test_options(temp_dir.path(), 1));

    let first = workflow.execute(SPEC).await.unwrap();
    let second = workflow.execute(SPEC).await.unwrap();

    assert_ne!(first.output_dir, second.output_dir);
    assert_eq!(project_dirs(temp_dir.path()).len(), 2);
}

#[tokio::test]
async fn test_heuristic_fallback_names_files_from_spec() {
    let temp_dir = TempDir::new().unwrap();
    let mut options = test_options(temp_dir.path(), 1);
    options.manifest_fallback = ManifestFallback::Heuristic;
    let invoker = RetryingInvoker::new(scripted("Approved"), RetryPolicy::immediate(1));
    let workflow = ProjectWorkflow::new(invoker, options);

    let outcome = workflow
        .execute("A calculator application in golang that must add numbers.")
        .await
        .unwrap();

    assert_eq!(outcome.manifest.implementation_file, "src/calculator.go");
    assert!(outcome.output_dir.join("tests/calculator_test.go").is_file());
}
