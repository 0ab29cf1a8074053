//! Core type definitions for Forge generation runs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A validated project specification
///
/// Only constructed through [`Specification::parse`], so holding one means the
/// text passed the structural checks. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specification(String);

impl Specification {
    pub(crate) fn new_unchecked(text: String) -> Self {
        Self(text)
    }

    /// The specification text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Specification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Target languages recognised by the manifest heuristic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Python,
    Cpp,
    JavaScript,
    Java,
    Go,
}

impl Language {
    /// Suffix appended to the base name for the implementation file
    pub fn implementation_suffix(&self) -> &'static str {
        match self {
            Language::Python => ".py",
            Language::Cpp => ".cpp",
            Language::JavaScript => ".js",
            Language::Java => ".java",
            Language::Go => ".go",
        }
    }

    /// Suffix appended to the base name for the test file
    pub fn test_suffix(&self) -> &'static str {
        match self {
            Language::Python => "_test.py",
            Language::Cpp => "_test.cpp",
            Language::JavaScript => ".test.js",
            Language::Java => "Test.java",
            Language::Go => "_test.go",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::Python => write!(f, "python"),
            Language::Cpp => write!(f, "cpp"),
            Language::JavaScript => write!(f, "javascript"),
            Language::Java => write!(f, "java"),
            Language::Go => write!(f, "go"),
        }
    }
}

/// Resolved file layout for one run
///
/// Every path is relative to the project root and has already been checked
/// for absolute components and traversal. Field access cannot fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub implementation_file: String,
    pub test_file: String,
    pub docs_file: String,
    pub interface_file: String,
    pub run_script: String,
    /// Free-form description of what goes into each path
    #[serde(rename = "file-mapping", default)]
    pub file_mapping: BTreeMap<String, String>,
}

impl Manifest {
    /// The fixed layout used whenever the LLM manifest cannot be trusted
    pub fn default_layout() -> Self {
        Self {
            name: None,
            language: None,
            implementation_file: "src/app.py".to_string(),
            test_file: "tests/test_app.py".to_string(),
            docs_file: "docs/README.md".to_string(),
            interface_file: "src/app.idl".to_string(),
            run_script: "build_and_run.sh".to_string(),
            file_mapping: BTreeMap::new(),
        }
    }

    /// Output path for a stage
    pub fn path_for(&self, stage: Stage) -> &str {
        match stage {
            Stage::Interface => &self.interface_file,
            Stage::Implementation => &self.implementation_file,
            Stage::RunScript => &self.run_script,
            Stage::Tests => &self.test_file,
            Stage::Docs => &self.docs_file,
        }
    }

    /// Content description for a path, if the manifest carried one
    pub fn description_for(&self, path: &str) -> Option<&str> {
        self.file_mapping.get(path).map(String::as_str)
    }

    /// All stage paths in execution order
    pub fn paths(&self) -> Vec<(Stage, &str)> {
        Stage::ORDER
            .iter()
            .map(|stage| (*stage, self.path_for(*stage)))
            .collect()
    }
}

/// One generation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Interface,
    Implementation,
    RunScript,
    Tests,
    Docs,
}

impl Stage {
    /// Fixed execution order; every stage appears after its prerequisites
    pub const ORDER: [Stage; 5] = [
        Stage::Interface,
        Stage::Implementation,
        Stage::RunScript,
        Stage::Tests,
        Stage::Docs,
    ];

    /// Stages whose output this stage consumes as context
    pub fn prerequisites(&self) -> &'static [Stage] {
        match self {
            Stage::Interface => &[],
            Stage::Implementation => &[Stage::Interface],
            Stage::RunScript => &[Stage::Interface],
            Stage::Tests => &[Stage::Implementation],
            Stage::Docs => &[Stage::Implementation, Stage::Tests],
        }
    }

}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Interface => write!(f, "interface"),
            Stage::Implementation => write!(f, "implementation"),
            Stage::RunScript => write!(f, "run_script"),
            Stage::Tests => write!(f, "tests"),
            Stage::Docs => write!(f, "docs"),
        }
    }
}

/// Text produced by one stage, tagged with where it was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageArtifact {
    pub stage: Stage,
    /// Path relative to the project root
    pub path: String,
    pub content: String,
}

/// Outcome of the automated code review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewVerdict {
    Approved,
    RevisionsRequired,
}

impl ReviewVerdict {
    /// Token whose presence marks an approval
    pub const APPROVAL_TOKEN: &'static str = "Approved";
    /// Token reviewers are asked to emit when changes are needed
    pub const REVISIONS_TOKEN: &'static str = "Revisions required";

    /// Derive a verdict from free-text review output
    ///
    /// Anything without the approval token, including an ambiguous or empty
    /// response, requires revisions.
    pub fn from_review(output: &str) -> Self {
        if output.contains(Self::APPROVAL_TOKEN) {
            ReviewVerdict::Approved
        } else {
            ReviewVerdict::RevisionsRequired
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ReviewVerdict::Approved)
    }
}

impl std::fmt::Display for ReviewVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewVerdict::Approved => write!(f, "approved"),
            ReviewVerdict::RevisionsRequired => write!(f, "revisions required"),
        }
    }
}
