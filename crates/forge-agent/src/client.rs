//! Anthropic API backend
//!
//! Each request is stateless: one user message, optional system persona.
//! Failures are classified for the retry policy but never retried here.

use crate::auth;
use crate::backend::{InvocationError, LlmBackend};
use crate::types::{AnthropicMessage, AnthropicRequest, AnthropicResponse, GenerationRequest, Model};
use async_trait::async_trait;
use forge_core::{ForgeError, ModelConfig, Result};
use reqwest::StatusCode;
use std::time::Duration;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: usize = 16000;

/// LLM backend for the Anthropic messages API
#[derive(Debug, Clone)]
pub struct AnthropicBackend {
    model: Model,
    max_tokens: usize,
    auth_token: String,
    http: reqwest::Client,
}

impl AnthropicBackend {
    /// Create a backend from the `[models]` config section, resolving
    /// credentials from the environment
    pub fn from_config(model: Model, config: &ModelConfig) -> Result<Self> {
        let api_key = auth::api_key_from_env(&config.api_key_env)?;
        Ok(
            Self::with_token(model, api_key, Duration::from_secs(config.request_timeout_secs))?
                .with_max_tokens(config.max_tokens),
        )
    }

    fn with_token(model: Model, auth_token: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForgeError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            model,
            max_tokens: DEFAULT_MAX_TOKENS,
            auth_token,
            http,
        })
    }

    /// Set max tokens for responses
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> Model {
        self.model
    }
}

/// Map a non-success status to an invocation error
fn classify_status(status: StatusCode, body: String) -> InvocationError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        InvocationError::RateLimited(body)
    } else if status.is_server_error() {
        InvocationError::TransientHttp(format!("Anthropic API error {}: {}", status, body))
    } else {
        InvocationError::Other(format!("Anthropic API error {}: {}", status, body))
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn generate(&self, request: &GenerationRequest) -> std::result::Result<String, InvocationError> {
        let prompt = request.render_prompt();
        tracing::debug!(
            role = %request.role,
            model = %self.model,
            "Sending request to Anthropic API ({} chars)",
            prompt.len()
        );

        let body = AnthropicRequest {
            model: self.model.api_name().to_string(),
            max_tokens: self.max_tokens,
            system: (!request.persona.is_empty()).then(|| request.persona.clone()),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.auth_token)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| InvocationError::TransientHttp(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown".to_string());
            return Err(classify_status(status, error_text));
        }

        let anthropic_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| InvocationError::Other(format!("Failed to parse response: {}", e)))?;

        let output: String = anthropic_response
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect();

        if anthropic_response.content.is_empty() {
            return Err(InvocationError::Other("No content in response".to_string()));
        }

        if let Some(usage) = &anthropic_response.usage {
            tracing::info!(
                role = %request.role,
                "Generation complete ({} chars, {} input tokens, {} output tokens)",
                output.len(),
                usage.input_tokens,
                usage.output_tokens
            );
        } else {
            tracing::info!(role = %request.role, "Generation complete ({} chars)", output.len());
        }

        Ok(output)
    }
}
