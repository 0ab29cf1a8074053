//! Per-run staging area for in-flight artifacts

use forge_agent::{validate_path, write_relative};
use forge_core::{ForgeError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory where stages write their output before finalization
///
/// One value per run. A failed run leaves its files here for diagnosis; a
/// successful finalize moves everything out.
#[derive(Debug)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    /// Create (if needed) and take ownership of the staging root
    pub fn acquire(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!("Acquired staging area at {}", root.display());
        Ok(Self { root })
    }

    /// Acquire the staging root for a generation run
    ///
    /// Refuses a root that is, or contains, any of `protected`, and a root
    /// that still holds files. Nothing is deleted here: files left by a
    /// failed run stay in place until the user removes them.
    pub fn acquire_for_run(root: impl Into<PathBuf>, protected: &[PathBuf]) -> Result<Self> {
        let staging = Self::acquire(root)?;
        let resolved_root = resolve(&staging.root);

        if let Some(path) = protected
            .iter()
            .find(|path| resolve(path).starts_with(&resolved_root))
        {
            return Err(ForgeError::Config(format!(
                "staging directory {} must not contain {}",
                staging.root.display(),
                path.display()
            )));
        }

        let stale = staging.files()?;
        if !stale.is_empty() {
            tracing::warn!(
                "Staging area {} holds {} file(s), first: {}",
                staging.root.display(),
                stale.len(),
                stale[0].display()
            );
            return Err(ForgeError::StagingNotEmpty(
                staging.root.display().to_string(),
            ));
        }

        Ok(staging)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a staged file, overwriting any earlier version
    pub fn write(&self, relative: &str, content: &str) -> Result<PathBuf> {
        write_relative(&self.root, relative, content)?;
        Ok(self.root.join(relative))
    }

    /// Read a staged file; `None` if it was never written
    pub fn read(&self, relative: &str) -> Result<Option<String>> {
        let path = self.root.join(validate_path(relative)?);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    /// Relative paths of every staged file, sorted
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if self.root.exists() {
            collect_files(&self.root, &self.root, &mut files)?;
        }
        files.sort();
        Ok(files)
    }

    /// Remove every top-level entry under the root
    pub fn clear(&self) -> Result<()> {
        if !self.root.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// End the run's use of the staging area
    ///
    /// Fails if staged files were left behind.
    pub fn release(self) -> Result<()> {
        let leftover = self.files()?;
        if !leftover.is_empty() {
            return Err(ForgeError::MaterializationFailure(format!(
                "staging area {} still holds {} file(s)",
                self.root.display(),
                leftover.len()
            )));
        }
        tracing::debug!("Released staging area at {}", self.root.display());
        Ok(())
    }
}

/// Canonical form of an existing path, absolute form otherwise
fn resolve(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_path_buf());
        }
    }
    Ok(())
}
