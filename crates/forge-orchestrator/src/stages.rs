//! Stage sequencing for orchestrated generation

use crate::prompt;
use crate::staging::StagingArea;
use forge_agent::{GenerationRequest, LlmBackend, RetryingInvoker};
use forge_core::{Manifest, Result, Specification, Stage, StageArtifact};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Stages run when adding a feature to an existing project
pub const FEATURE_ORDER: [Stage; 4] = [
    Stage::Implementation,
    Stage::Tests,
    Stage::Docs,
    Stage::RunScript,
];

/// Status of a stage
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StageStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed(String),
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Pending => write!(f, "pending"),
            StageStatus::InProgress => write!(f, "in progress"),
            StageStatus::Completed => write!(f, "completed"),
            StageStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Remove one Markdown fence wrapping the whole output
///
/// Output with text outside the fence, or with more than one fenced block, is
/// returned unchanged.
pub fn strip_code_fence(output: &str) -> String {
    let trimmed = output.trim();
    if trimmed.len() < 6 || !trimmed.starts_with("```") || !trimmed.ends_with("```") {
        return output.to_string();
    }

    let Some(newline) = trimmed.find('\n') else {
        return output.to_string();
    };
    if newline + 1 > trimmed.len() - 3 {
        return output.to_string();
    }

    let body = &trimmed[newline + 1..trimmed.len() - 3];
    if body.contains("```") {
        return output.to_string();
    }

    format!("{}\n", body.trim_end())
}

/// Prerequisites of `stage` that take part in a feature addition
fn feature_prerequisites(stage: Stage) -> Vec<Stage> {
    stage
        .prerequisites()
        .iter()
        .copied()
        .filter(|prereq| *prereq != Stage::Interface)
        .collect()
}

/// Upstream outputs for `stage`, empty where a prerequisite is unavailable
fn gather_upstream<'u>(
    stage: Stage,
    prerequisites: &[Stage],
    upstream: &'u BTreeMap<Stage, StageArtifact>,
) -> Vec<(Stage, &'u str)> {
    prerequisites
        .iter()
        .map(|prereq| {
            let content = upstream
                .get(prereq)
                .map(|artifact| artifact.content.as_str())
                .unwrap_or_default();
            if content.trim().is_empty() {
                warn!(
                    stage = %stage,
                    prerequisite = %prereq,
                    "Prerequisite output unavailable, continuing with empty context"
                );
            }
            (*prereq, content)
        })
        .collect()
}

/// Drives generation stages in dependency order
pub struct StageSequencer<'a, B: LlmBackend> {
    invoker: &'a RetryingInvoker<B>,
    staging: &'a StagingArea,
    status: BTreeMap<Stage, StageStatus>,
}

impl<'a, B: LlmBackend> StageSequencer<'a, B> {
    pub fn new(invoker: &'a RetryingInvoker<B>, staging: &'a StagingArea) -> Self {
        Self {
            invoker,
            staging,
            status: BTreeMap::new(),
        }
    }

    /// Get stage status
    pub fn status(&self, stage: Stage) -> StageStatus {
        self.status.get(&stage).cloned().unwrap_or_default()
    }

    /// Check if every stage in `stages` completed
    pub fn all_completed(&self, stages: &[Stage]) -> bool {
        stages
            .iter()
            .all(|stage| self.status(*stage) == StageStatus::Completed)
    }

    fn set_status(&mut self, stage: Stage, status: StageStatus) {
        debug!(stage = %stage, "Stage {} -> {}", stage, status);
        self.status.insert(stage, status);
    }

    /// Run all stages in [`Stage::ORDER`]
    ///
    /// The first failing stage aborts the sequence.
    pub async fn run(
        &mut self,
        spec: &Specification,
        manifest: &Manifest,
    ) -> Result<BTreeMap<Stage, StageArtifact>> {
        self.status.clear();
        let mut artifacts = BTreeMap::new();

        for stage in Stage::ORDER {
            let artifact = self.run_stage(stage, spec, manifest, &artifacts).await?;
            artifacts.insert(stage, artifact);
        }

        Ok(artifacts)
    }

    /// Run a single stage against whatever upstream output is available
    pub async fn run_stage(
        &mut self,
        stage: Stage,
        spec: &Specification,
        manifest: &Manifest,
        upstream: &BTreeMap<Stage, StageArtifact>,
    ) -> Result<StageArtifact> {
        let context = gather_upstream(stage, stage.prerequisites(), upstream);
        let request = prompt::stage_request(stage, spec.as_str(), manifest, &context);
        self.execute(stage, manifest.path_for(stage), &request).await
    }

    /// Run the feature-addition stages in [`FEATURE_ORDER`]
    pub async fn run_feature(
        &mut self,
        spec: &Specification,
        manifest: &Manifest,
        feature: &str,
    ) -> Result<BTreeMap<Stage, StageArtifact>> {
        self.status.clear();
        let mut artifacts = BTreeMap::new();

        for stage in FEATURE_ORDER {
            let prerequisites = feature_prerequisites(stage);
            let context = gather_upstream(stage, &prerequisites, &artifacts);
            let request =
                prompt::feature_request(stage, spec.as_str(), feature, manifest, &context);
            let artifact = self
                .execute(stage, manifest.path_for(stage), &request)
                .await?;
            artifacts.insert(stage, artifact);
        }

        Ok(artifacts)
    }

    async fn execute(
        &mut self,
        stage: Stage,
        path: &str,
        request: &GenerationRequest,
    ) -> Result<StageArtifact> {
        self.set_status(stage, StageStatus::InProgress);
        info!(stage = %stage, path, "Running {} stage", stage);

        let output = match self.invoker.invoke(request).await {
            Ok(output) => output,
            Err(e) => {
                self.set_status(stage, StageStatus::Failed(e.to_string()));
                return Err(e);
            }
        };

        let content = strip_code_fence(&output);
        debug!(
            stage = %stage,
            "Stage output: {} chars ({} after normalization)",
            output.len(),
            content.len()
        );

        if let Err(e) = self.staging.write(path, &content) {
            self.set_status(stage, StageStatus::Failed(e.to_string()));
            return Err(e);
        }

        self.set_status(stage, StageStatus::Completed);
        info!(stage = %stage, path, "Stage complete");

        Ok(StageArtifact {
            stage,
            path: path.to_string(),
            content,
        })
    }
}
