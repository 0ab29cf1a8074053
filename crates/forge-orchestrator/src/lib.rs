//! # forge-orchestrator
//!
//! Generation pipeline for Forge.
//!
//! This crate provides:
//! - Manifest resolution with a fallback layout
//! - Role-specific task descriptors for every agent
//! - Stage sequencing in dependency order
//! - A bounded review loop over the staged implementation
//! - Staging and materialization into timestamped project directories
//! - The [`ProjectWorkflow`] tying it together, plus feature addition

mod activity_logger;
mod manifest;
mod materializer;
pub mod prompt;
mod review;
mod stages;
mod staging;
mod workflow;

pub use activity_logger::ActivityLogger;
pub use manifest::{
    base_name, detect_language, fallback_manifest, heuristic_manifest, parse_manifest,
    ManifestParseError, ManifestResolver, RawManifest,
};
pub use materializer::{render_summary, ArtifactMaterializer, SUMMARY_FILE, TIMESTAMP_FORMAT};
pub use review::{ReviewDecision, ReviewLoop, ReviewState};
pub use stages::{strip_code_fence, StageSequencer, StageStatus, FEATURE_ORDER};
pub use staging::StagingArea;
pub use workflow::{GenerationOutcome, ProjectWorkflow, WorkflowOptions};
