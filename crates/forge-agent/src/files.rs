//! Safe writes of generated files
//!
//! Every path that reaches the filesystem comes from an LLM manifest, so it is
//! checked before use: relative only, no `..`, no protected names.

use forge_core::{ForgeError, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Protected file patterns that should never be overwritten
pub const PROTECTED_FILES: &[&str] = &[".git", ".env", ".forge", ".secrets", ".gitignore"];

/// Validate that a path is safe to write to
pub fn validate_path(path: &str) -> Result<PathBuf> {
    if path.trim().is_empty() {
        return Err(ForgeError::PathValidation("Empty path".to_string()));
    }

    let path = Path::new(path);

    // Reject absolute paths
    if path.is_absolute() || path.has_root() {
        return Err(ForgeError::PathValidation(format!(
            "Absolute paths not allowed: {}",
            path.display()
        )));
    }

    // Check for path traversal
    for component in path.components() {
        if let Component::ParentDir = component {
            return Err(ForgeError::PathValidation(format!(
                "Path traversal not allowed: {}",
                path.display()
            )));
        }
    }

    // Check protected files
    for component in path.components() {
        if let Component::Normal(name) = component {
            let name = name.to_string_lossy();
            if PROTECTED_FILES.contains(&name.as_ref()) {
                return Err(ForgeError::PathValidation(format!(
                    "Cannot write to protected file: {}",
                    path.display()
                )));
            }
        }
    }

    Ok(path.to_path_buf())
}

/// Write `content` to `relative` under `root`, creating parent directories
///
/// Returns Ok(true) if the file was created, Ok(false) if it was overwritten.
pub fn write_relative(root: &Path, relative: &str, content: &str) -> Result<bool> {
    let path = root.join(validate_path(relative)?);
    let created = !path.exists();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::debug!("Created directory: {}", parent.display());
        }
    }

    fs::write(&path, content)?;

    if created {
        tracing::debug!("Created file: {}", path.display());
    } else {
        tracing::debug!("Overwrote file: {}", path.display());
    }

    Ok(created)
}
