//! # forge-agent
//!
//! The LLM boundary of the Forge pipeline.
//!
//! - [`LlmBackend`] is the capability every stage talks to: one
//!   [`GenerationRequest`] in, raw text out, or an [`InvocationError`]
//! - [`AnthropicBackend`] implements it over the Anthropic messages API
//! - [`RetryPolicy`] and [`execute_with_policy`] apply exponential backoff with
//!   full jitter to any fallible async operation
//! - [`RetryingInvoker`] combines a backend with a policy
//! - [`ScriptedBackend`] replays canned responses for tests
//!
//! Backends never retry on their own; retrying is the invoker's job.

mod auth;
mod backend;
mod client;
mod files;
mod invoker;
mod mock;
mod retry;
mod types;

pub use auth::api_key_from_env;
pub use backend::{InvocationError, LlmBackend};
pub use client::AnthropicBackend;
pub use files::{validate_path, write_relative, PROTECTED_FILES};
pub use invoker::RetryingInvoker;
pub use mock::ScriptedBackend;
pub use retry::{execute_with_policy, RetryClassify, RetryExhausted, RetryOn, RetryPolicy};
pub use types::*;
