//! Artifact Materializer - Finalize a run into a timestamped project directory
//!
//! Layout under the base directory:
//! - `YYYY-MM-DD_HH-MM-SS/` per run, `-1`, `-2`, ... appended on collision
//! - every artifact at its manifest path
//! - `generation_summary.txt` listing the artifacts
//!
//! Staged files are copied in and the staging root is cleared only after
//! every write succeeded, so a failed finalize leaves the staged tree intact.

use crate::staging::StagingArea;
use chrono::Local;
use forge_agent::validate_path;
use forge_core::{ForgeError, Result};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Name of the summary file written into every project directory
pub const SUMMARY_FILE: &str = "generation_summary.txt";

/// Timestamp format of project directory names
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Upper bound on collision suffixes tried for one timestamp
const MAX_COLLISION_SUFFIX: u32 = 1000;

/// Render the summary file
pub fn render_summary<'a>(timestamp: &str, paths: impl IntoIterator<Item = &'a str>) -> String {
    let mut summary = format!("Project generated at: {}\nGenerated files:\n", timestamp);
    for path in paths {
        summary.push_str(&format!("- {}\n", path));
    }
    summary
}

fn failure(context: &str, path: &Path, err: impl std::fmt::Display) -> ForgeError {
    ForgeError::MaterializationFailure(format!("{} {}: {}", context, path.display(), err))
}

/// Writes finished runs under a base directory
#[derive(Debug, Clone)]
pub struct ArtifactMaterializer {
    base_dir: PathBuf,
}

impl ArtifactMaterializer {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Create the project directory, write `artifacts` (path -> content) and
    /// the summary, move the staged tree in, then clear staging
    ///
    /// Returns the project directory. On failure the partially written
    /// project directory is removed and staging is left untouched.
    pub async fn finalize(
        &self,
        staging: &StagingArea,
        artifacts: &BTreeMap<String, String>,
    ) -> Result<PathBuf> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let project_dir = self.create_project_dir(&timestamp).await?;

        if let Err(e) = self.populate(&project_dir, &timestamp, staging, artifacts).await {
            tracing::error!(
                "Finalize failed, staged files kept at {}: {}",
                staging.root().display(),
                e
            );
            if let Err(cleanup) = fs::remove_dir_all(&project_dir).await {
                tracing::warn!(
                    "Could not remove incomplete project directory {}: {}",
                    project_dir.display(),
                    cleanup
                );
            }
            return Err(e);
        }

        staging
            .clear()
            .map_err(|e| failure("Failed to clear staging area", staging.root(), e))?;

        tracing::info!(
            "Project written to {} ({} files)",
            project_dir.display(),
            artifacts.len()
        );
        Ok(project_dir)
    }

    /// Create a fresh directory for `timestamp`, suffixing on collision
    async fn create_project_dir(&self, timestamp: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| failure("Failed to create output directory", &self.base_dir, e))?;

        for suffix in 0..=MAX_COLLISION_SUFFIX {
            let name = if suffix == 0 {
                timestamp.to_string()
            } else {
                format!("{}-{}", timestamp, suffix)
            };
            let candidate = self.base_dir.join(name);

            match fs::create_dir(&candidate).await {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!("{} exists, trying next suffix", candidate.display());
                }
                Err(e) => return Err(failure("Failed to create project directory", &candidate, e)),
            }
        }

        Err(ForgeError::MaterializationFailure(format!(
            "No free project directory for timestamp {} under {}",
            timestamp,
            self.base_dir.display()
        )))
    }

    async fn populate(
        &self,
        project_dir: &Path,
        timestamp: &str,
        staging: &StagingArea,
        artifacts: &BTreeMap<String, String>,
    ) -> Result<()> {
        for (relative, content) in artifacts {
            let safe = validate_path(relative)
                .map_err(|e| ForgeError::MaterializationFailure(e.to_string()))?;
            write_file(&project_dir.join(safe), content).await?;
        }

        let summary = render_summary(timestamp, artifacts.keys().map(String::as_str));
        write_file(&project_dir.join(SUMMARY_FILE), &summary).await?;

        let staged = staging
            .files()
            .map_err(|e| failure("Failed to list staging area", staging.root(), e))?;
        for relative in staged {
            let source = staging.root().join(&relative);
            let destination = project_dir.join(&relative);
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| failure("Failed to create directory", parent, e))?;
            }
            fs::copy(&source, &destination)
                .await
                .map_err(|e| failure("Failed to move staged file", &source, e))?;
            tracing::debug!("Moved {} to {}", source.display(), destination.display());
        }

        Ok(())
    }
}

async fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| failure("Failed to create directory", parent, e))?;
    }
    fs::write(path, content)
        .await
        .map_err(|e| failure("Failed to write", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifacts(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(path, content)| (path.to_string(), content.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_finalize_writes_artifacts_and_summary() {
        let temp_dir = TempDir::new().unwrap();
        let staging = StagingArea::acquire(temp_dir.path().join("staging")).unwrap();
        let materializer = ArtifactMaterializer::new(temp_dir.path().join("generated_projects"));

        let project_dir = materializer
            .finalize(
                &staging,
                &artifacts(&[("src/app.py", "X"), ("docs/README.md", "Y")]),
            )
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(project_dir.join("src/app.py")).unwrap(), "X");
        assert_eq!(
            std::fs::read_to_string(project_dir.join("docs/README.md")).unwrap(),
            "Y"
        );

        let summary = std::fs::read_to_string(project_dir.join(SUMMARY_FILE)).unwrap();
        assert!(summary.starts_with("Project generated at: "));
        assert!(summary.contains("Generated files:\n"));
        assert!(summary.contains("- src/app.py\n"));
        assert!(summary.contains("- docs/README.md\n"));
        assert!(staging.files().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_finalize_moves_staged_tree() {
        let temp_dir = TempDir::new().unwrap();
        let staging = StagingArea::acquire(temp_dir.path().join("staging")).unwrap();
        staging.write("src/app.py", "staged version").unwrap();
        staging.write("requirements.txt", "pytest").unwrap();
        let materializer = ArtifactMaterializer::new(temp_dir.path().join("out"));

        let project_dir = materializer
            .finalize(&staging, &artifacts(&[("src/app.py", "artifact version")]))
            .await
            .unwrap();

        // the staged file overwrites the artifact written under the same path
        assert_eq!(
            std::fs::read_to_string(project_dir.join("src/app.py")).unwrap(),
            "staged version"
        );
        assert_eq!(
            std::fs::read_to_string(project_dir.join("requirements.txt")).unwrap(),
            "pytest"
        );
        assert_eq!(std::fs::read_dir(staging.root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_two_finalizes_get_distinct_directories() {
        let temp_dir = TempDir::new().unwrap();
        let staging = StagingArea::acquire(temp_dir.path().join("staging")).unwrap();
        let materializer = ArtifactMaterializer::new(temp_dir.path().join("out"));
        let files = artifacts(&[("src/app.py", "X")]);

        let first = materializer.finalize(&staging, &files).await.unwrap();
        let second = materializer.finalize(&staging, &files).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read_dir(materializer.base_dir()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_staging_and_removes_project_dir() {
        let temp_dir = TempDir::new().unwrap();
        let staging = StagingArea::acquire(temp_dir.path().join("staging")).unwrap();
        staging.write("src/app.py", "staged").unwrap();
        let materializer = ArtifactMaterializer::new(temp_dir.path().join("out"));

        let err = materializer
            .finalize(&staging, &artifacts(&[("../escape.py", "X")]))
            .await
            .unwrap_err();

        assert!(matches!(err, ForgeError::MaterializationFailure(_)));
        assert_eq!(staging.files().unwrap(), vec![PathBuf::from("src/app.py")]);
        assert_eq!(std::fs::read_dir(materializer.base_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_render_summary() {
        let summary = render_summary("2025-01-01_00-00-00", ["a.py", "b.md"]);
        assert_eq!(
            summary,
            "Project generated at: 2025-01-01_00-00-00\nGenerated files:\n- a.py\n- b.md\n"
        );
    }
}
