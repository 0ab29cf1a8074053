//! Activity Logger - Human-readable run logging to `.forge/activity.md`
//!
//! Records, per run:
//! - The resolved manifest
//! - Every completed stage
//! - Each review pass with a preview of the reviewer's answer
//! - The final outcome or the error that ended the run
//!
//! Every method is fail-open: a logging failure never affects the run.

use chrono::Utc;
use forge_core::fail_open::fail_open;
use forge_core::{Manifest, ReviewVerdict, StageArtifact};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Maximum character length for review text in the log preview
const REVIEW_PREVIEW_CHARS: usize = 500;

fn preview(text: &str) -> String {
    if text.chars().count() > REVIEW_PREVIEW_CHARS {
        let truncated: String = text.chars().take(REVIEW_PREVIEW_CHARS).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

/// Activity logger for generation runs
pub struct ActivityLogger {
    output_path: PathBuf,
}

impl ActivityLogger {
    /// Create a logger writing to `activity.md` inside `forge_dir`
    pub fn new(forge_dir: impl AsRef<Path>) -> Self {
        Self {
            output_path: forge_dir.as_ref().join("activity.md"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.output_path
    }

    /// Start a fresh log for a run, replacing the previous one
    pub async fn log_run_start(&self, title: &str, subject: &str, max_iterations: usize) {
        fail_open("activity_logger::log_run_start", || async {
            if let Some(parent) = self.output_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
            let content = format!(
                "# Forge Activity Log\n\n## {}: {}\n**Started**: {}\n**Max Review Iterations**: {}\n\n---\n\n",
                title,
                subject.lines().next().unwrap_or(subject),
                timestamp,
                max_iterations
            );

            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.output_path)
                .await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;

            Ok(())
        })
        .await;
    }

    pub async fn log_manifest(&self, manifest: &Manifest) {
        fail_open("activity_logger::log_manifest", || async {
            let mut content = String::from("### Manifest\n\n");
            if let Some(name) = &manifest.name {
                content.push_str(&format!("**Project**: {}\n", name));
            }
            if let Some(language) = &manifest.language {
                content.push_str(&format!("**Language**: {}\n", language));
            }
            for (stage, path) in manifest.paths() {
                content.push_str(&format!("- {}: `{}`\n", stage, path));
            }
            content.push('\n');

            self.append_internal(&content).await
        })
        .await;
    }

    pub async fn log_stage(&self, artifact: &StageArtifact) {
        fail_open("activity_logger::log_stage", || async {
            let content = format!(
                "- Stage **{}** wrote `{}` ({} chars)\n",
                artifact.stage,
                artifact.path,
                artifact.content.chars().count()
            );
            self.append_internal(&content).await
        })
        .await;
    }

    pub async fn log_review(&self, iteration: usize, verdict: ReviewVerdict, review: &str) {
        fail_open("activity_logger::log_review", || async {
            let mut content = format!("\n### Review {}\n**Verdict**: {}\n\n", iteration, verdict);
            content.push_str("> ");
            content.push_str(&preview(review.trim()).replace('\n', "\n> "));
            content.push_str("\n\n---\n\n");

            self.append_internal(&content).await
        })
        .await;
    }

    pub async fn log_run_complete(
        &self,
        output_dir: &Path,
        verdict: Option<ReviewVerdict>,
        review_iterations: usize,
    ) {
        fail_open("activity_logger::log_run_complete", || async {
            let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
            let verdict = verdict
                .map(|v| v.to_string())
                .unwrap_or_else(|| "not reviewed".to_string());

            let content = format!(
                "## Run Summary\n\n\
                **Completed**: {}\n\
                **Output**: {}\n\
                **Verdict**: {}\n\
                **Review Iterations**: {}\n\n",
                timestamp,
                output_dir.display(),
                verdict,
                review_iterations
            );

            self.append_internal(&content).await
        })
        .await;
    }

    pub async fn log_run_failed(&self, error: &str) {
        fail_open("activity_logger::log_run_failed", || async {
            let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
            let content = format!(
                "## Run Failed\n\n**Time**: {}\n**Error**: {}\n\n",
                timestamp, error
            );
            self.append_internal(&content).await
        })
        .await;
    }

    async fn append_internal(&self, content: &str) -> forge_core::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_path)
            .await?;

        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}
