//! LLM invocation under a retry policy

use crate::backend::LlmBackend;
use crate::retry::{execute_with_policy, RetryPolicy};
use crate::types::GenerationRequest;
use forge_core::{ForgeError, Result};
use tracing::debug;

/// A backend paired with the policy applied to each of its invocations
pub struct RetryingInvoker<B: LlmBackend> {
    backend: B,
    policy: RetryPolicy,
}

impl<B: LlmBackend> RetryingInvoker<B> {
    pub fn new(backend: B, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Invoke the backend, retrying per policy
    ///
    /// Fails with [`ForgeError::InvocationFailed`] once the policy gives up.
    pub async fn invoke(&self, request: &GenerationRequest) -> Result<String> {
        let operation = format!("generate[{}]", request.role);

        execute_with_policy(&self.policy, &operation, |attempt| {
            debug!(role = %request.role, attempt, "Invoking backend");
            self.backend.generate(request)
        })
        .await
        .map_err(|exhausted| ForgeError::InvocationFailed {
            role: request.role.clone(),
            attempts: exhausted.attempts,
            message: exhausted.last_error.to_string(),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
