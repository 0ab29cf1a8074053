//! The generation capability every stage depends on

use async_trait::async_trait;
use thiserror::Error;

use crate::retry::RetryClassify;
use crate::types::GenerationRequest;

/// Why a single invocation failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    /// The provider asked us to slow down (HTTP 429)
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Server errors, timeouts and connection failures
    #[error("transient HTTP error: {0}")]
    TransientHttp(String),

    /// Anything else: malformed requests, unparsable responses
    #[error("{0}")]
    Other(String),
}

impl RetryClassify for InvocationError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            InvocationError::RateLimited(_) | InvocationError::TransientHttp(_)
        )
    }
}

/// Trait for LLM backends (allows scripting in tests)
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Produce raw text for one request. Implementations must not retry.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, InvocationError>;
}
