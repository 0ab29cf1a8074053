//! Structural checks applied to a specification before any generation

use crate::types::Specification;
use crate::{ForgeError, Result};
use std::path::Path;

/// Minimum trimmed length of a usable specification
const MIN_SPEC_LEN: usize = 10;

/// Words that signal the text actually states requirements
pub const REQUIREMENT_TERMS: &[&str] = &["should", "must", "will", "application"];

/// Validate raw specification text
///
/// Rules are checked in order and the first violation is reported.
pub fn validate_specification(spec: &str) -> Result<()> {
    if spec.trim().chars().count() < MIN_SPEC_LEN {
        return Err(ForgeError::InvalidSpecification(
            "Specification is too short to be valid".to_string(),
        ));
    }

    let lowered = spec.to_lowercase();
    if !REQUIREMENT_TERMS.iter().any(|term| lowered.contains(term)) {
        return Err(ForgeError::InvalidSpecification(
            "Specification must contain clear requirements (using words like 'should', 'must', 'will')"
                .to_string(),
        ));
    }

    Ok(())
}

impl Specification {
    /// Validate text and wrap it as a specification
    pub fn parse(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        validate_specification(&text)?;
        Ok(Specification::new_unchecked(text))
    }
}

/// Read a specification file, trimming surrounding whitespace
pub fn read_specification(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let content = String::from_utf8(bytes).map_err(|_| {
        ForgeError::InvalidSpecification(format!(
            "Specification file {} is not valid UTF-8",
            path.display()
        ))
    })?;

    let content = content.trim();
    if content.is_empty() {
        return Err(ForgeError::InvalidSpecification(
            "Specification file is empty".to_string(),
        ));
    }

    Ok(content.to_string())
}
