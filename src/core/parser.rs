//! TC-004: transcc.yaml parsing and validation.
//!
//! Parses the config and validates structural constraints:
//! - Version must be "1.0"
//! - Backend models, base URLs and key variables must be non-empty
//! - At least one compiler candidate, non-empty file names
//! - `compare.ignore_lines` entries must be valid regexes

use super::types::*;
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a transcc.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<TransccConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Load the config if the file exists, otherwise fall back to defaults.
pub fn load_or_default(path: &Path) -> Result<TransccConfig, String> {
    if path.exists() {
        parse_config_file(path)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(TransccConfig::default())
    }
}

/// Parse a transcc.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<TransccConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &TransccConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut push = |message: String| errors.push(ValidationError { message });

    if config.version != "1.0" {
        push(format!(
            "version must be \"1.0\", got \"{}\"",
            config.version
        ));
    }

    for (label, backend) in [
        ("gpt", &config.backends.gpt),
        ("claude", &config.backends.claude),
    ] {
        if backend.model.trim().is_empty() {
            push(format!("backend '{}' has no model", label));
        }
        if backend.base_url.trim().is_empty() {
            push(format!("backend '{}' has no base_url", label));
        }
        if backend.api_key_env.trim().is_empty() {
            push(format!("backend '{}' has no api_key_env", label));
        }
        if backend.max_tokens == Some(0) {
            push(format!("backend '{}' max_tokens must be positive", label));
        }
    }

    if config.source.interpreter.trim().is_empty() {
        push("source interpreter must not be empty".to_string());
    }

    let tc = &config.toolchain;
    if tc.compilers.is_empty() {
        push("toolchain needs at least one compiler candidate".to_string());
    }
    if tc.compilers.iter().any(|c| c.trim().is_empty()) {
        push("toolchain compiler names must not be empty".to_string());
    }
    if tc.source_file.trim().is_empty() {
        push("toolchain source_file must not be empty".to_string());
    }
    if tc.artifact.trim().is_empty() {
        push("toolchain artifact must not be empty".to_string());
    }
    if tc.source_file == tc.artifact {
        push(format!(
            "toolchain source_file and artifact are both '{}'",
            tc.source_file
        ));
    }

    for pattern in &config.compare.ignore_lines {
        if let Err(e) = regex::Regex::new(pattern) {
            push(format!("compare.ignore_lines '{}' is not a valid regex: {}", pattern, e));
        }
    }

    errors
}
