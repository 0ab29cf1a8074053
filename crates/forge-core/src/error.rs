//! Unified error types for Forge

use thiserror::Error;

/// Unified error type for all Forge operations
#[derive(Error, Debug)]
pub enum ForgeError {
    // Input errors
    #[error("Invalid specification: {0}")]
    InvalidSpecification(String),

    // LLM boundary errors
    #[error("Invocation failed for {role} after {attempts} attempt(s): {message}")]
    InvocationFailed {
        role: String,
        attempts: u32,
        message: String,
    },

    #[error("Authentication error: {0}")]
    Auth(String),

    // Pipeline errors
    #[error("Staging area {0} still holds files from an earlier run; inspect and remove them")]
    StagingNotEmpty(String),

    #[error("Materialization failed: {0}")]
    MaterializationFailure(String),

    #[error("Path validation failed: {0}")]
    PathValidation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl ForgeError {
    /// Whether this error aborts a run before any generation happened
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ForgeError::InvalidSpecification(_)
                | ForgeError::Config(_)
                | ForgeError::Auth(_)
                | ForgeError::StagingNotEmpty(_)
        )
    }
}

/// Result type alias using ForgeError
pub type Result<T> = std::result::Result<T, ForgeError>;
