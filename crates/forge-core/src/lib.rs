//! # forge-core
//!
//! Core types for the Forge specification-to-project generation pipeline.
//!
//! A run turns a plain-text project specification into a generated project:
//! an interface definition, an implementation, a run script, tests and docs.
//! This crate holds the pieces every other crate shares:
//!
//! - The validated [`Specification`] and the typed [`Manifest`] of output paths
//! - The ordered generation [`Stage`]s and their [`StageArtifact`] outputs
//! - The [`ReviewVerdict`] derived from the automated review
//! - [`ForgeConfig`] loaded from `.forge/config.toml`
//! - The unified [`ForgeError`] type

mod config;
mod error;
pub mod fail_open;
mod types;
mod validation;

pub use config::{
    ForgeConfig, ManifestConfig, ManifestFallback, ModelConfig, PathsConfig, RetryConfig,
    ReviewConfig,
};
pub use error::{ForgeError, Result};
pub use types::*;
pub use validation::{read_specification, validate_specification, REQUIREMENT_TERMS};
