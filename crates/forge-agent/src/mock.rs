//! Scripted backend for tests
//!
//! Responses are queued per role and handed out in order. Once a role's queue
//! is drained its default (if any) is returned on every further call.

use crate::backend::{InvocationError, LlmBackend};
use crate::types::GenerationRequest;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

type Scripted = Result<String, InvocationError>;

#[derive(Debug, Default)]
struct Script {
    queued: HashMap<String, VecDeque<Scripted>>,
    defaults: HashMap<String, Scripted>,
    requests: Vec<GenerationRequest>,
}

/// [`LlmBackend`] that replays canned outputs keyed by role
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful output for `role`
    pub fn with_response(self, role: &str, output: impl Into<String>) -> Self {
        self.enqueue(role, Ok(output.into()))
    }

    /// Queue a failure for `role`
    pub fn with_failure(self, role: &str, error: InvocationError) -> Self {
        self.enqueue(role, Err(error))
    }

    /// Output returned for `role` whenever its queue is empty
    pub fn with_default(self, role: &str, output: impl Into<String>) -> Self {
        self.set_default(role, Ok(output.into()))
    }

    /// Failure returned for `role` whenever its queue is empty
    pub fn with_default_failure(self, role: &str, error: InvocationError) -> Self {
        self.set_default(role, Err(error))
    }

    fn enqueue(self, role: &str, entry: Scripted) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script
                .queued
                .entry(role.to_string())
                .or_default()
                .push_back(entry);
        }
        self
    }

    fn set_default(self, role: &str, entry: Scripted) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.defaults.insert(role.to_string(), entry);
        }
        self
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.script
            .lock()
            .map(|script| script.requests.clone())
            .unwrap_or_default()
    }

    /// Requests received for a single role
    pub fn calls_for(&self, role: &str) -> Vec<GenerationRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.role == role)
            .collect()
    }

    pub fn call_count(&self, role: &str) -> usize {
        self.calls_for(role).len()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, InvocationError> {
        let mut script = self
            .script
            .lock()
            .map_err(|e| InvocationError::Other(format!("script lock poisoned: {}", e)))?;

        script.requests.push(request.clone());

        if let Some(entry) = script
            .queued
            .get_mut(&request.role)
            .and_then(|queue| queue.pop_front())
        {
            return entry;
        }

        script
            .defaults
            .get(&request.role)
            .cloned()
            .unwrap_or_else(|| {
                Err(InvocationError::Other(format!(
                    "no scripted response for role '{}'",
                    request.role
                )))
            })
    }
}
