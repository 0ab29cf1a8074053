//! Type definitions for Forge agent interactions

use serde::{Deserialize, Serialize};

/// Claude model variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    Opus,
    #[default]
    Sonnet,
    Haiku,
}

impl Model {
    /// Get the API model name
    pub fn api_name(&self) -> &'static str {
        match self {
            Model::Opus => "claude-opus-4-20250514",
            Model::Sonnet => "claude-sonnet-4-5-20250929",
            Model::Haiku => "claude-haiku-3-5-20250929",
        }
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Model::Opus => write!(f, "opus"),
            Model::Sonnet => write!(f, "sonnet"),
            Model::Haiku => write!(f, "haiku"),
        }
    }
}

impl std::str::FromStr for Model {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "opus" => Ok(Model::Opus),
            "sonnet" => Ok(Model::Sonnet),
            "haiku" => Ok(Model::Haiku),
            _ => Err(format!("Invalid model: {}. Use opus, sonnet, or haiku.", s)),
        }
    }
}

/// A labelled block of upstream material handed to an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSection {
    pub label: String,
    pub content: String,
}

impl ContextSection {
    pub fn new(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            content: content.into(),
        }
    }
}

/// Everything one agent needs to produce one piece of output
///
/// Stages build these; backends consume them. The persona fields are opaque
/// to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Agent role, e.g. "Senior Code Reviewer"
    pub role: String,
    /// Persona text sent as the system prompt
    pub persona: String,
    /// What to do
    pub instructions: String,
    /// Upstream artifacts, in the order they should appear
    pub context: Vec<ContextSection>,
    /// Description of the expected answer
    pub expected_output: String,
    /// Where the result will be written, relative to the project root
    pub output_path: Option<String>,
}

impl GenerationRequest {
    pub fn new(role: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            persona: String::new(),
            instructions: instructions.into(),
            context: Vec::new(),
            expected_output: String::new(),
            output_path: None,
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_context(mut self, label: impl Into<String>, content: impl Into<String>) -> Self {
        self.context.push(ContextSection::new(label, content));
        self
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = expected.into();
        self
    }

    pub fn with_output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Content of the first context section with the given label
    pub fn context_for(&self, label: &str) -> Option<&str> {
        self.context
            .iter()
            .find(|section| section.label == label)
            .map(|section| section.content.as_str())
    }

    /// Render the user prompt sent to the model
    pub fn render_prompt(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str("## TASK\n\n");
        prompt.push_str(&self.instructions);
        prompt.push_str("\n\n");

        for section in &self.context {
            prompt.push_str(&format!("## {}\n\n", section.label.to_uppercase()));
            prompt.push_str(&section.content);
            prompt.push_str("\n\n");
        }

        if let Some(path) = &self.output_path {
            prompt.push_str(&format!("## OUTPUT FILE\n\n{}\n\n", path));
        }

        if !self.expected_output.is_empty() {
            prompt.push_str("## EXPECTED OUTPUT\n\n");
            prompt.push_str(&self.expected_output);
            prompt.push('\n');
        }

        prompt
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Anthropic API message format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

/// Anthropic API request format
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
}

/// Anthropic API response format
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicResponse {
    #[allow(dead_code)]
    pub id: String,
    pub content: Vec<AnthropicContent>,
    pub usage: Option<Usage>,
}

/// Content block in Anthropic response
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicContent {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    pub content_type: String,
    #[serde(default)]
    pub text: String,
}
