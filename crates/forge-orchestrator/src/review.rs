//! Bounded review of the staged implementation
//!
//! Each pass sends the implementation to the reviewer and derives a
//! [`ReviewVerdict`]. Rejection with budget left asks the caller to run the
//! stages again. The review text itself is not fed back into regeneration.

use crate::prompt;
use crate::staging::StagingArea;
use forge_agent::{LlmBackend, RetryingInvoker};
use forge_core::fail_open::fail_open_or;
use forge_core::{Manifest, Result, ReviewVerdict, Stage};
use tracing::{info, warn};

/// Where the loop stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    Pending,
    Reviewed(ReviewVerdict),
}

/// What the caller should do after a review pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    /// Stop and keep the current artifacts
    Accept(ReviewVerdict),
    /// Run the generation stages again
    Regenerate,
}

/// Review loop with an iteration budget
#[derive(Debug)]
pub struct ReviewLoop {
    max_iterations: usize,
    iterations: usize,
    state: ReviewState,
    last_review: Option<String>,
}

impl ReviewLoop {
    /// A budget of 0 is treated as 1
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
            iterations: 0,
            state: ReviewState::Pending,
            last_review: None,
        }
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Review passes completed so far
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn state(&self) -> ReviewState {
        self.state
    }

    /// Raw text of the most recent review
    pub fn last_review(&self) -> Option<&str> {
        self.last_review.as_deref()
    }

    /// Review the staged implementation
    ///
    /// A missing staged file is reviewed as empty text.
    pub async fn run<B: LlmBackend>(
        &mut self,
        invoker: &RetryingInvoker<B>,
        staging: &StagingArea,
        manifest: &Manifest,
    ) -> Result<ReviewDecision> {
        let path = manifest.path_for(Stage::Implementation);
        let code = fail_open_or("review::read_implementation", None, || staging.read(path))
            .unwrap_or_else(|| {
                warn!(path, "Staged implementation not found, reviewing empty text");
                String::new()
            });

        self.review(invoker, &code).await
    }

    /// Review `code` and decide whether another pass is needed
    ///
    /// An invocation failure is fatal to the run.
    pub async fn review<B: LlmBackend>(
        &mut self,
        invoker: &RetryingInvoker<B>,
        code: &str,
    ) -> Result<ReviewDecision> {
        let request = prompt::review_request(code);
        let response = invoker.invoke(&request).await?;

        let verdict = ReviewVerdict::from_review(&response);
        self.iterations += 1;
        self.state = ReviewState::Reviewed(verdict);
        info!(
            iteration = self.iterations,
            max_iterations = self.max_iterations,
            verdict = %verdict,
            "Code review: {}",
            response.trim()
        );
        self.last_review = Some(response);

        Ok(self.decide(verdict))
    }

    fn decide(&self, verdict: ReviewVerdict) -> ReviewDecision {
        if verdict.is_approved() {
            return ReviewDecision::Accept(verdict);
        }

        if self.iterations < self.max_iterations {
            info!(
                iteration = self.iterations,
                "Revisions required, regenerating"
            );
            ReviewDecision::Regenerate
        } else {
            warn!(
                iterations = self.iterations,
                "Review budget exhausted without approval, keeping last artifacts"
            );
            ReviewDecision::Accept(verdict)
        }
    }
}
