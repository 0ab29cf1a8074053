//! File-layout manifest resolution
//!
//! The architect agent proposes a layout as JSON. Its answer is untrusted:
//! anything unparsable, incomplete or unsafe is replaced by a fallback layout,
//! so [`ManifestResolver::resolve`] always produces a [`Manifest`].

use crate::prompt;
use forge_agent::{validate_path, LlmBackend, RetryingInvoker};
use forge_core::{Language, Manifest, ManifestFallback, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why an LLM manifest was rejected
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ManifestParseError {
    #[error("response is empty")]
    Empty,

    #[error("invalid manifest JSON: {0}")]
    InvalidJson(String),

    #[error("manifest array is empty")]
    EmptyArray,

    #[error("missing required key: {0}")]
    MissingKey(&'static str),

    #[error("unsafe path for {key}: {path}")]
    UnsafePath { key: &'static str, path: String },
}

/// Manifest as the LLM wrote it; every field may be absent
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub implementation_file: Option<String>,
    #[serde(default)]
    pub test_file: Option<String>,
    #[serde(default)]
    pub docs_file: Option<String>,
    #[serde(default)]
    pub interface_file: Option<String>,
    #[serde(default)]
    pub run_script: Option<String>,
    #[serde(rename = "file-mapping", default)]
    pub file_mapping: Option<BTreeMap<String, serde_json::Value>>,
}

impl RawManifest {
    /// Promote to a [`Manifest`], requiring every path to be present and safe
    pub fn into_manifest(self) -> std::result::Result<Manifest, ManifestParseError> {
        let implementation_file = required("implementation_file", self.implementation_file)?;
        let test_file = required("test_file", self.test_file)?;
        let docs_file = required("docs_file", self.docs_file)?;
        let interface_file = required("interface_file", self.interface_file)?;
        let run_script = required("run_script", self.run_script)?;

        // Descriptions are free-form; keep strings, stringify anything else
        let file_mapping = self
            .file_mapping
            .unwrap_or_default()
            .into_iter()
            .map(|(path, value)| {
                let description = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (path, description)
            })
            .collect();

        Ok(Manifest {
            name: self.name,
            language: self.language,
            implementation_file,
            test_file,
            docs_file,
            interface_file,
            run_script,
            file_mapping,
        })
    }
}

fn required(key: &'static str, value: Option<String>) -> std::result::Result<String, ManifestParseError> {
    let path = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ManifestParseError::MissingKey(key))?;

    if validate_path(&path).is_err() {
        return Err(ManifestParseError::UnsafePath { key, path });
    }

    Ok(path)
}

fn json_fence() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)```").ok())
        .as_ref()
}

/// Parse an LLM manifest response
///
/// Uses the first ```` ```json ```` fenced block when there is one, otherwise
/// the whole response. An array yields its first element.
pub fn parse_manifest(response: &str) -> std::result::Result<Manifest, ManifestParseError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(ManifestParseError::Empty);
    }

    let body = json_fence()
        .and_then(|re| re.captures(trimmed))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    let value: serde_json::Value = serde_json::from_str(body.trim())
        .map_err(|e| ManifestParseError::InvalidJson(e.to_string()))?;

    let value = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .next()
            .ok_or(ManifestParseError::EmptyArray)?,
        other => other,
    };

    let raw: RawManifest = serde_json::from_value(value)
        .map_err(|e| ManifestParseError::InvalidJson(e.to_string()))?;

    raw.into_manifest()
}

fn language_patterns() -> &'static [(Language, Regex)] {
    static PATTERNS: OnceLock<Vec<(Language, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (Language::Python, r"\b(python|flask|django|fastapi)\b"),
            (Language::Cpp, r"(\bc\+\+|\b(cpp|gcc)\b)"),
            (Language::JavaScript, r"\b(javascript|node|express|react)\b"),
            (Language::Java, r"\b(java|spring|maven)\b"),
            (Language::Go, r"\b(go|golang)\b"),
        ]
        .into_iter()
        .filter_map(|(language, pattern)| Regex::new(pattern).ok().map(|re| (language, re)))
        .collect()
    })
}

/// Guess the target language from keywords in the specification
///
/// Languages are tried in a fixed order; the first match wins.
pub fn detect_language(spec: &str) -> Language {
    let spec = spec.to_lowercase();
    language_patterns()
        .iter()
        .find(|(_, re)| re.is_match(&spec))
        .map(|(language, _)| *language)
        .unwrap_or_default()
}

const BASE_NAME_INDICATORS: &[&str] = &["calculator", "server", "api", "service", "app"];

/// First whitespace-separated word naming the kind of project
pub fn base_name(spec: &str) -> &'static str {
    spec.split_whitespace()
        .map(str::to_lowercase)
        .find_map(|word| {
            BASE_NAME_INDICATORS
                .iter()
                .find(|indicator| **indicator == word)
                .copied()
        })
        .unwrap_or("app")
}

/// Layout derived from the specification alone
pub fn heuristic_manifest(spec: &str) -> Manifest {
    let language = detect_language(spec);
    let base = base_name(spec);

    Manifest {
        name: None,
        language: Some(language.to_string()),
        implementation_file: format!("src/{}{}", base, language.implementation_suffix()),
        test_file: format!("tests/{}{}", base, language.test_suffix()),
        docs_file: "docs/README.md".to_string(),
        interface_file: format!("src/{}.idl", base),
        run_script: "build_and_run.sh".to_string(),
        file_mapping: BTreeMap::new(),
    }
}

/// Layout used when the LLM manifest is rejected
pub fn fallback_manifest(fallback: ManifestFallback, spec: &str) -> Manifest {
    match fallback {
        ManifestFallback::Fixed => Manifest::default_layout(),
        ManifestFallback::Heuristic => heuristic_manifest(spec),
    }
}

/// Resolves the file layout for a run
pub struct ManifestResolver<'a, B: LlmBackend> {
    invoker: &'a RetryingInvoker<B>,
    fallback: ManifestFallback,
}

impl<'a, B: LlmBackend> ManifestResolver<'a, B> {
    pub fn new(invoker: &'a RetryingInvoker<B>, fallback: ManifestFallback) -> Self {
        Self { invoker, fallback }
    }

    /// Ask the architect for a layout
    ///
    /// An unusable answer falls back to the configured layout. Only an
    /// invocation that exhausts its retries is an error.
    pub async fn resolve(&self, spec: &str) -> Result<Manifest> {
        let request = prompt::manifest_request(spec);
        let response = self.invoker.invoke(&request).await?;
        debug!("Manifest response: {} chars", response.len());

        let manifest = match parse_manifest(&response) {
            Ok(manifest) => {
                info!(
                    implementation = %manifest.implementation_file,
                    tests = %manifest.test_file,
                    docs = %manifest.docs_file,
                    interface = %manifest.interface_file,
                    run_script = %manifest.run_script,
                    "Resolved manifest"
                );
                manifest
            }
            Err(e) => {
                let manifest = fallback_manifest(self.fallback, spec);
                warn!(
                    implementation = %manifest.implementation_file,
                    "Could not parse manifest ({}), using {:?} layout",
                    e,
                    self.fallback
                );
                manifest
            }
        };
        Ok(manifest)
    }
}
