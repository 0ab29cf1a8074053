//! End-to-end generation runs

use crate::activity_logger::ActivityLogger;
use crate::manifest::ManifestResolver;
use crate::materializer::ArtifactMaterializer;
use crate::review::{ReviewDecision, ReviewLoop, ReviewState};
use crate::stages::StageSequencer;
use crate::staging::StagingArea;
use forge_agent::{LlmBackend, RetryingInvoker};
use forge_core::{
    ForgeConfig, ForgeError, Manifest, ManifestFallback, Result, ReviewVerdict, Specification,
    Stage, StageArtifact,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{error, info};

/// Where a run reads and writes, and how long it reviews
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOptions {
    /// Base directory for timestamped project directories
    pub output_dir: PathBuf,
    /// Staging root for in-flight artifacts
    pub staging_dir: PathBuf,
    /// Directory holding `activity.md`
    pub activity_dir: PathBuf,
    /// Specification file the run was read from, kept out of staging
    pub spec_file: Option<PathBuf>,
    pub max_review_iterations: usize,
    pub manifest_fallback: ManifestFallback,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self::from_config(&ForgeConfig::default())
    }
}

impl WorkflowOptions {
    pub fn from_config(config: &ForgeConfig) -> Self {
        Self {
            output_dir: config.paths.output_dir.clone(),
            staging_dir: config.paths.staging_dir.clone(),
            activity_dir: PathBuf::from(".forge"),
            spec_file: Some(config.paths.spec_file.clone()),
            max_review_iterations: config.review.max_iterations,
            manifest_fallback: config.manifest.fallback,
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub output_dir: PathBuf,
    pub manifest: Manifest,
    /// `None` when the run had no review step
    pub verdict: Option<ReviewVerdict>,
    pub review_iterations: usize,
    /// Relative paths of the generated files
    pub files: Vec<String>,
}

/// Orchestrates validation, generation, review and materialization
pub struct ProjectWorkflow<B: LlmBackend> {
    invoker: RetryingInvoker<B>,
    options: WorkflowOptions,
    activity: ActivityLogger,
}

impl<B: LlmBackend> ProjectWorkflow<B> {
    pub fn new(invoker: RetryingInvoker<B>, options: WorkflowOptions) -> Self {
        let activity = ActivityLogger::new(&options.activity_dir);
        Self {
            invoker,
            options,
            activity,
        }
    }

    pub fn invoker(&self) -> &RetryingInvoker<B> {
        &self.invoker
    }

    pub fn options(&self) -> &WorkflowOptions {
        &self.options
    }

    /// Resolve the manifest for a specification without generating anything
    pub async fn resolve_manifest(&self, spec_text: &str) -> Result<Manifest> {
        let spec = Specification::parse(spec_text)?;
        self.resolver().resolve(spec.as_str()).await
    }

    /// Generate a complete project from a specification
    pub async fn execute(&self, spec_text: &str) -> Result<GenerationOutcome> {
        let spec = Specification::parse(spec_text)?;
        self.activity
            .log_run_start("Generate", spec.as_str(), self.options.max_review_iterations)
            .await;

        let result = self.generate(&spec).await;
        self.finish(result).await
    }

    /// Add a feature to the project described by `spec_text`
    ///
    /// Regenerates implementation, tests, docs and run script into a new
    /// project directory. There is no interface stage and no review.
    pub async fn add_feature(&self, spec_text: &str, feature: &str) -> Result<GenerationOutcome> {
        let spec = Specification::parse(spec_text)?;
        let feature = feature.trim();
        if feature.is_empty() {
            return Err(ForgeError::InvalidSpecification(
                "Feature description is empty".to_string(),
            ));
        }
        self.activity.log_run_start("Add feature", feature, 0).await;

        let result = self.generate_feature(&spec, feature).await;
        self.finish(result).await
    }

    fn resolver(&self) -> ManifestResolver<'_, B> {
        ManifestResolver::new(&self.invoker, self.options.manifest_fallback)
    }

    async fn finish(&self, result: Result<GenerationOutcome>) -> Result<GenerationOutcome> {
        match &result {
            Ok(outcome) => {
                self.activity
                    .log_run_complete(
                        &outcome.output_dir,
                        outcome.verdict,
                        outcome.review_iterations,
                    )
                    .await;
            }
            Err(e) => {
                error!("Run failed: {}", e);
                self.activity.log_run_failed(&e.to_string()).await;
            }
        }
        result
    }

    /// Acquire staging; the root may not hold the working directory or
    /// anything the run reads or writes outside of staging
    fn acquire_staging(&self) -> Result<StagingArea> {
        let mut protected = vec![
            self.options.output_dir.clone(),
            self.options.activity_dir.clone(),
        ];
        protected.extend(self.options.spec_file.clone());
        if let Ok(cwd) = std::env::current_dir() {
            protected.push(cwd);
        }
        StagingArea::acquire_for_run(&self.options.staging_dir, &protected)
    }

    async fn generate(&self, spec: &Specification) -> Result<GenerationOutcome> {
        let manifest = self.resolver().resolve(spec.as_str()).await?;
        self.activity.log_manifest(&manifest).await;

        let staging = self.acquire_staging()?;
        let mut review = ReviewLoop::new(self.options.max_review_iterations);
        let mut sequencer = StageSequencer::new(&self.invoker, &staging);

        let (artifacts, verdict) = loop {
            info!(
                pass = review.iterations() + 1,
                max = review.max_iterations(),
                "Generating project"
            );
            let artifacts = sequencer.run(spec, &manifest).await?;
            for artifact in artifacts.values() {
                self.activity.log_stage(artifact).await;
            }

            let decision = review.run(&self.invoker, &staging, &manifest).await?;
            if let (ReviewState::Reviewed(verdict), Some(text)) =
                (review.state(), review.last_review())
            {
                self.activity
                    .log_review(review.iterations(), verdict, text)
                    .await;
            }

            match decision {
                ReviewDecision::Accept(verdict) => break (artifacts, verdict),
                ReviewDecision::Regenerate => continue,
            }
        };

        let files = by_path(artifacts);
        let output_dir = self.materialize(staging, &files).await?;

        info!(
            output = %output_dir.display(),
            verdict = %verdict,
            iterations = review.iterations(),
            "Project generated"
        );

        Ok(GenerationOutcome {
            output_dir,
            manifest,
            verdict: Some(verdict),
            review_iterations: review.iterations(),
            files: files.into_keys().collect(),
        })
    }

    async fn generate_feature(
        &self,
        spec: &Specification,
        feature: &str,
    ) -> Result<GenerationOutcome> {
        let manifest = self.resolver().resolve(spec.as_str()).await?;
        self.activity.log_manifest(&manifest).await;

        let staging = self.acquire_staging()?;
        let mut sequencer = StageSequencer::new(&self.invoker, &staging);
        let artifacts = sequencer.run_feature(spec, &manifest, feature).await?;
        for artifact in artifacts.values() {
            self.activity.log_stage(artifact).await;
        }

        let files = by_path(artifacts);
        let output_dir = self.materialize(staging, &files).await?;
        info!(output = %output_dir.display(), "Feature added");

        Ok(GenerationOutcome {
            output_dir,
            manifest,
            verdict: None,
            review_iterations: 0,
            files: files.into_keys().collect(),
        })
    }

    async fn materialize(
        &self,
        staging: StagingArea,
        files: &BTreeMap<String, String>,
    ) -> Result<PathBuf> {
        let output_dir = ArtifactMaterializer::new(&self.options.output_dir)
            .finalize(&staging, files)
            .await?;
        staging.release()?;
        Ok(output_dir)
    }
}

/// Artifact contents keyed by output path
fn by_path(artifacts: BTreeMap<Stage, StageArtifact>) -> BTreeMap<String, String> {
    artifacts
        .into_values()
        .map(|artifact| (artifact.path, artifact.content))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::{profile_for, ARCHITECT, REVIEWER};
    use forge_agent::{RetryPolicy, ScriptedBackend};
    use tempfile::TempDir;

    const SPEC: &str = "The application must add two numbers and should handle division by zero.";

    fn options(root: &std::path::Path, max_review_iterations: usize) -> WorkflowOptions {
        WorkflowOptions {
            output_dir: root.join("generated_projects"),
            staging_dir: root.join("staging"),
            activity_dir: root.join(".forge"),
            spec_file: None,
            max_review_iterations,
            manifest_fallback: ManifestFallback::Fixed,
        }
    }

    fn stage_backend() -> ScriptedBackend {
        Stage::ORDER
            .iter()
            .fold(ScriptedBackend::new(), |backend, stage| {
                backend.with_default(profile_for(*stage).role, format!("{} v", stage))
            })
            .with_default(ARCHITECT.role, "not json")
    }

    #[tokio::test]
    async fn test_invalid_spec_makes_no_calls() {
        let temp_dir = TempDir::new().unwrap();
        let workflow = ProjectWorkflow::new(
            RetryingInvoker::new(stage_backend(), RetryPolicy::immediate(1)),
            options(temp_dir.path(), 1),
        );

        let err = workflow.execute("too short").await.unwrap_err();
        assert!(matches!(err, ForgeError::InvalidSpecification(_)));
        assert!(workflow.invoker().backend().requests().is_empty());
        assert!(!temp_dir.path().join("generated_projects").exists());
    }

    #[tokio::test]
    async fn test_rejection_regenerates_then_accepts() {
        let temp_dir = TempDir::new().unwrap();
        let backend = stage_backend()
            .with_response(REVIEWER.role, "Revisions required: more tests")
            .with_response(REVIEWER.role, "Approved");
        let workflow = ProjectWorkflow::new(
            RetryingInvoker::new(backend, RetryPolicy::immediate(1)),
            options(temp_dir.path(), 3),
        );

        let outcome = workflow.execute(SPEC).await.unwrap();
        assert_eq!(outcome.verdict, Some(ReviewVerdict::Approved));
        assert_eq!(outcome.review_iterations, 2);

        let backend = workflow.invoker().backend();
        assert_eq!(backend.call_count(profile_for(Stage::Interface).role), 2);
        assert_eq!(backend.call_count(REVIEWER.role), 2);
    }

    #[tokio::test]
    async fn test_stage_failure_creates_no_output() {
        let temp_dir = TempDir::new().unwrap();
        let backend = ScriptedBackend::new()
            .with_default(ARCHITECT.role, "not json")
            .with_default(profile_for(Stage::Interface).role, "idl");
        let workflow = ProjectWorkflow::new(
            RetryingInvoker::new(backend, RetryPolicy::immediate(2)),
            options(temp_dir.path(), 1),
        );

        let err = workflow.execute(SPEC).await.unwrap_err();
        assert!(matches!(err, ForgeError::InvocationFailed { attempts: 2, .. }));
        assert!(!temp_dir.path().join("generated_projects").exists());

        // staged interface is kept for diagnosis
        assert!(temp_dir.path().join("staging/src/app.idl").exists());

        let log = std::fs::read_to_string(temp_dir.path().join(".forge/activity.md")).unwrap();
        assert!(log.contains("## Run Failed"));

        // the next run refuses to start over the leftovers instead of wiping them
        let err = workflow.execute(SPEC).await.unwrap_err();
        assert!(matches!(err, ForgeError::StagingNotEmpty(_)));
        assert!(temp_dir.path().join("staging/src/app.idl").exists());
    }

    #[tokio::test]
    async fn test_staging_dir_holding_user_files_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let spec_file = temp_dir.path().join("project_spec.txt");
        std::fs::write(&spec_file, SPEC).unwrap();
        std::fs::create_dir_all(temp_dir.path().join("mycode")).unwrap();
        std::fs::write(temp_dir.path().join("mycode/important.rs"), "fn main() {}").unwrap();

        let mut opts = options(temp_dir.path(), 1);
        opts.staging_dir = temp_dir.path().to_path_buf();
        opts.spec_file = Some(spec_file.clone());
        let workflow = ProjectWorkflow::new(
            RetryingInvoker::new(stage_backend(), RetryPolicy::immediate(1)),
            opts.clone(),
        );

        let err = workflow.execute(SPEC).await.unwrap_err();
        assert!(matches!(err, ForgeError::Config(_)));
        assert!(spec_file.exists());
        assert!(temp_dir.path().join("mycode/important.rs").exists());
        assert!(!temp_dir.path().join("generated_projects").exists());

        // without a spec file to protect, the user's files still block the run
        opts.spec_file = None;
        opts.output_dir = temp_dir.path().join("out/generated_projects");
        opts.activity_dir = temp_dir.path().join("out/.forge");
        opts.staging_dir = temp_dir.path().join("mycode");
        let workflow = ProjectWorkflow::new(
            RetryingInvoker::new(stage_backend(), RetryPolicy::immediate(1)),
            opts,
        );
        let err = workflow.execute(SPEC).await.unwrap_err();
        assert!(matches!(err, ForgeError::StagingNotEmpty(_)));
        assert!(temp_dir.path().join("mycode/important.rs").exists());
    }

    #[tokio::test]
    async fn test_manifest_invocation_failure_ends_run() {
        let temp_dir = TempDir::new().unwrap();
        let backend = stage_backend().with_default_failure(
            ARCHITECT.role,
            forge_agent::InvocationError::TransientHttp("connection reset".into()),
        );
        let workflow = ProjectWorkflow::new(
            RetryingInvoker::new(backend, RetryPolicy::immediate(3)),
            options(temp_dir.path(), 1),
        );

        let err = workflow.execute(SPEC).await.unwrap_err();
        assert!(matches!(err, ForgeError::InvocationFailed { attempts: 3, .. }));
        assert_eq!(
            workflow
                .invoker()
                .backend()
                .call_count(profile_for(Stage::Interface).role),
            0
        );
        assert!(!temp_dir.path().join("staging").exists());
    }

    #[tokio::test]
    async fn test_add_feature() {
        let temp_dir = TempDir::new().unwrap();
        let workflow = ProjectWorkflow::new(
            RetryingInvoker::new(stage_backend(), RetryPolicy::immediate(1)),
            options(temp_dir.path(), 1),
        );

        let outcome = workflow.add_feature(SPEC, "Support subtraction").await.unwrap();
        assert_eq!(outcome.verdict, None);
        assert_eq!(
            outcome.files,
            vec![
                "build_and_run.sh".to_string(),
                "docs/README.md".to_string(),
                "src/app.py".to_string(),
                "tests/test_app.py".to_string(),
            ]
        );
        assert!(!outcome.output_dir.join("src/app.idl").exists());
        assert_eq!(
            workflow
                .invoker()
                .backend()
                .call_count(profile_for(Stage::Interface).role),
            0
        );

        let err = workflow.add_feature(SPEC, "   ").await.unwrap_err();
        assert!(matches!(err, ForgeError::InvalidSpecification(_)));
    }
}
