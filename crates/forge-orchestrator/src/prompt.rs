//! Task descriptors for each agent
//!
//! Builds the [`GenerationRequest`] for every LLM call in a run:
//! - The manifest request that decides the file layout
//! - One request per generation stage, carrying upstream artifacts as context
//! - The review request for the staged implementation
//! - Feature-addition variants of the implementation, tests and docs stages

use forge_agent::GenerationRequest;
use forge_core::{Manifest, ReviewVerdict, Stage};

/// Context label for the project specification
pub const SPECIFICATION_LABEL: &str = "specification";
/// Context label for a requested feature
pub const FEATURE_LABEL: &str = "feature";
/// Context label for the code under review
pub const CODE_LABEL: &str = "code";

/// Role, goal and backstory of one agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentProfile {
    pub role: &'static str,
    pub goal: &'static str,
    pub backstory: &'static str,
}

impl AgentProfile {
    /// System prompt for this agent
    pub fn persona(&self) -> String {
        format!(
            "You are a {}. Your goal: {}.\n\n{}",
            self.role, self.goal, self.backstory
        )
    }

    fn request(&self, instructions: impl Into<String>) -> GenerationRequest {
        GenerationRequest::new(self.role, instructions).with_persona(self.persona())
    }
}

pub const ARCHITECT: AgentProfile = AgentProfile {
    role: "Project Architect",
    goal: "Determine project structure and file organization",
    backstory: "You analyze project requirements and choose file names and a layout \
                that fit the target language and its conventions.",
};

pub const INTERFACE_DESIGNER: AgentProfile = AgentProfile {
    role: "IDL Specification Expert",
    goal: "Convert project specifications into a detailed interface definition",
    backstory: "You translate business requirements into technical interfaces, \
                data structures and error specifications.",
};

pub const DEVELOPER: AgentProfile = AgentProfile {
    role: "Senior Software Developer",
    goal: "Implement high-quality, maintainable code based on specifications",
    backstory: "You turn technical specifications into working implementations \
                with proper error handling and documentation.",
};

pub const BUILD_ENGINEER: AgentProfile = AgentProfile {
    role: "Build Engineer",
    goal: "Create a script that installs dependencies, builds, tests and runs the project",
    backstory: "You make sure a project can be run from a single shell script.",
};

pub const TESTER: AgentProfile = AgentProfile {
    role: "Testing Specialist",
    goal: "Create comprehensive tests for the generated code",
    backstory: "You write thorough test suites with edge case coverage \
                for any programming language.",
};

pub const TECHNICAL_WRITER: AgentProfile = AgentProfile {
    role: "Technical Writer",
    goal: "Create application documentation",
    backstory: "You write user-friendly documentation for command-line software.",
};

pub const REVIEWER: AgentProfile = AgentProfile {
    role: "Senior Code Reviewer",
    goal: "Review and provide feedback on generated code",
    backstory: "You ensure code quality, maintainability and adherence to best practices.",
};

/// Agent responsible for a stage
pub fn profile_for(stage: Stage) -> AgentProfile {
    match stage {
        Stage::Interface => INTERFACE_DESIGNER,
        Stage::Implementation => DEVELOPER,
        Stage::RunScript => BUILD_ENGINEER,
        Stage::Tests => TESTER,
        Stage::Docs => TECHNICAL_WRITER,
    }
}

const PLAIN_TEXT_ONLY: &str =
    "Respond with the file content only. Do not wrap it in Markdown or add commentary.";

/// Request asking the architect for the file-layout manifest
pub fn manifest_request(spec: &str) -> GenerationRequest {
    ARCHITECT
        .request(
            "Analyze the project specification and determine an appropriate file structure. \
             Choose an implementation file, a test file, a documentation file, an interface \
             definition file and a run script suited to the target language.",
        )
        .with_context(SPECIFICATION_LABEL, spec)
        .with_expected_output(
            "A ```json fenced block holding one object with the keys name, language, \
             implementation_file, test_file, docs_file, interface_file, run_script and \
             file-mapping. Paths are relative to the project root. file-mapping maps each \
             path to a description of what goes into that file.",
        )
}

fn stage_instructions(stage: Stage) -> &'static str {
    match stage {
        Stage::Interface => {
            "Create a detailed interface definition for the project: data structures, \
             interfaces, type definitions and error specifications. If the target language \
             has no IDL, write the definitions as comments in that language."
        }
        Stage::Implementation => {
            "Implement the complete application described by the specification and the \
             interface definition, in the specified language, with proper error handling \
             and documentation."
        }
        Stage::RunScript => {
            "Write a script that installs dependencies, compiles the project, runs the \
             unit tests and starts the application."
        }
        Stage::Tests => {
            "Create comprehensive unit tests for the code, written in the same language. \
             Cover every public function, error handling and edge cases."
        }
        Stage::Docs => {
            "Create documentation for the application: installation and setup, usage \
             examples and a troubleshooting section."
        }
    }
}

fn stage_expected_output(stage: Stage) -> &'static str {
    match stage {
        Stage::Interface => "A complete interface definition document.",
        Stage::Implementation => "The complete source file.",
        Stage::RunScript => "A plain-text shell script.",
        Stage::Tests => "The complete test file.",
        Stage::Docs => "A Markdown README.",
    }
}

/// Request for one generation stage
///
/// `upstream` holds the output of each prerequisite in
/// [`Stage::prerequisites`] order.
pub fn stage_request(
    stage: Stage,
    spec: &str,
    manifest: &Manifest,
    upstream: &[(Stage, &str)],
) -> GenerationRequest {
    let path = manifest.path_for(stage);
    let profile = profile_for(stage);

    let mut instructions = stage_instructions(stage).to_string();
    if let Some(language) = &manifest.language {
        instructions.push_str(&format!(" The target language is {}.", language));
    }
    if let Some(description) = manifest.description_for(path) {
        instructions.push_str(&format!(" This file {}.", description.trim_end_matches('.')));
    }

    let mut request = profile
        .request(instructions)
        .with_context(SPECIFICATION_LABEL, spec);
    for (upstream_stage, content) in upstream {
        request = request.with_context(upstream_stage.to_string(), *content);
    }

    request
        .with_output_path(path)
        .with_expected_output(format!("{} {}", stage_expected_output(stage), PLAIN_TEXT_ONLY))
}

/// Request for one stage of a feature addition
///
/// Only implementation, tests, docs and the run script take part.
pub fn feature_request(
    stage: Stage,
    spec: &str,
    feature: &str,
    manifest: &Manifest,
    upstream: &[(Stage, &str)],
) -> GenerationRequest {
    let path = manifest.path_for(stage);
    let profile = profile_for(stage);

    let instructions = match stage {
        Stage::Implementation => "Add this feature to the existing implementation. \
                                  Produce the complete updated source file.",
        Stage::Tests => "Update the test suite so it also covers the new feature.",
        Stage::Docs => "Update the documentation to describe the new feature.",
        _ => stage_instructions(stage),
    };

    let mut request = profile
        .request(instructions)
        .with_context(FEATURE_LABEL, feature)
        .with_context(SPECIFICATION_LABEL, spec);
    for (upstream_stage, content) in upstream {
        request = request.with_context(upstream_stage.to_string(), *content);
    }

    request
        .with_output_path(path)
        .with_expected_output(format!("{} {}", stage_expected_output(stage), PLAIN_TEXT_ONLY))
}

/// Request asking the reviewer to judge the implementation
pub fn review_request(code: &str) -> GenerationRequest {
    REVIEWER
        .request(format!(
            "Review the following generated code for maintainability, design, error handling \
             and style. If the code is acceptable, include '{}' in your response. If \
             improvements are needed, include '{}' followed by a list of suggestions.",
            ReviewVerdict::APPROVAL_TOKEN,
            ReviewVerdict::REVISIONS_TOKEN
        ))
        .with_context(CODE_LABEL, code)
        .with_expected_output(format!(
            "A plain-text review containing '{}' or '{}'.",
            ReviewVerdict::APPROVAL_TOKEN,
            ReviewVerdict::REVISIONS_TOKEN
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_roles_are_distinct() {
        let mut roles: Vec<_> = Stage::ORDER.iter().map(|s| profile_for(*s).role).collect();
        roles.push(ARCHITECT.role);
        roles.push(REVIEWER.role);
        let count = roles.len();
        roles.sort();
        roles.dedup();
        assert_eq!(roles.len(), count);
    }

    #[test]
    fn test_implementation_request_carries_interface() {
        let manifest = Manifest::default_layout();
        let request = stage_request(
            Stage::Implementation,
            "The application must add numbers.",
            &manifest,
            &[(Stage::Interface, "interface Calculator {}")],
        );

        assert_eq!(request.role, DEVELOPER.role);
        assert_eq!(
            request.context_for(SPECIFICATION_LABEL),
            Some("The application must add numbers.")
        );
        assert_eq!(request.context_for("interface"), Some("interface Calculator {}"));
        assert_eq!(request.output_path.as_deref(), Some("src/app.py"));
    }

    #[test]
    fn test_every_stage_request_carries_specification() {
        let manifest = Manifest::default_layout();
        for stage in Stage::ORDER {
            let request =
                stage_request(stage, "The application must add numbers.", &manifest, &[]);
            assert_eq!(
                request.context_for(SPECIFICATION_LABEL),
                Some("The application must add numbers."),
                "{} request lacks the specification",
                stage
            );
        }

        let request = stage_request(
            Stage::Tests,
            "The application must add numbers.",
            &manifest,
            &[(Stage::Implementation, "def add(a, b): return a + b")],
        );
        assert_eq!(request.context[0].label, SPECIFICATION_LABEL);
        assert_eq!(
            request.context_for("implementation"),
            Some("def add(a, b): return a + b")
        );
    }

    #[test]
    fn test_stage_request_uses_manifest_description() {
        let mut manifest = Manifest::default_layout();
        manifest.language = Some("Python".to_string());
        manifest
            .file_mapping
            .insert("src/app.py".to_string(), "contains the calculator".to_string());

        let request = stage_request(Stage::Implementation, "spec", &manifest, &[]);
        assert!(request.instructions.contains("The target language is Python."));
        assert!(request.instructions.contains("This file contains the calculator."));
    }

    #[test]
    fn test_feature_request_context() {
        let manifest = Manifest::default_layout();
        let request = feature_request(
            Stage::Implementation,
            "The application must add numbers.",
            "Support subtraction",
            &manifest,
            &[],
        );

        assert!(request.instructions.contains("Add this feature"));
        assert_eq!(request.context_for(FEATURE_LABEL), Some("Support subtraction"));
        assert!(request.context_for(SPECIFICATION_LABEL).is_some());

        let tests = feature_request(
            Stage::Tests,
            "spec",
            "Support subtraction",
            &manifest,
            &[(Stage::Implementation, "code")],
        );
        assert_eq!(tests.context_for(SPECIFICATION_LABEL), Some("spec"));
        assert_eq!(tests.context_for(FEATURE_LABEL), Some("Support subtraction"));
        assert_eq!(tests.context_for("implementation"), Some("code"));
    }

    #[test]
    fn test_review_request_mentions_tokens() {
        let request = review_request("print('hi')");
        assert_eq!(request.role, REVIEWER.role);
        assert!(request.instructions.contains("Approved"));
        assert!(request.instructions.contains("Revisions required"));
        assert_eq!(request.context_for(CODE_LABEL), Some("print('hi')"));
    }
}
