//! TC-001: Pipeline types — programs, translations, execution outcomes, and
//! the `transcc.yaml` configuration schema.
//!
//! Config types derive Serialize/Deserialize with defaults on every field so
//! an empty (or absent) config file yields a working setup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Programs and translations
// ============================================================================

/// Python source text supplied by the caller. Immutable for the lifetime of
/// one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceProgram(String);

impl SourceProgram {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceProgram {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for SourceProgram {
    fn from(code: String) -> Self {
        Self(code)
    }
}

/// Cumulative translated text produced so far by a backend. Never a diff.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartialTranslation(pub String);

impl PartialTranslation {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// A fully drained translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Translation {
    pub backend: String,
    pub code: String,
    pub increments: usize,
}

// ============================================================================
// Execution outcomes
// ============================================================================

/// Name of a native compiler executable (e.g. `g++`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompilerId(pub String);

impl fmt::Display for CompilerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A step of a pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Source,
    Discover,
    Persist,
    Build,
    Run,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Source => write!(f, "source"),
            Stage::Discover => write!(f, "discover"),
            Stage::Persist => write!(f, "persist"),
            Stage::Build => write!(f, "build"),
            Stage::Run => write!(f, "run"),
        }
    }
}

/// Terminal outcome of running a program. Carries no reference to the
/// artifact that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionResult {
    Success { stdout: String },
    CompileFailure { compiler: CompilerId, diagnostic: String },
    RuntimeFailure { exit_code: i32, diagnostic: String },
    ToolchainUnavailable { detail: String },
    Timeout { stage: Stage, limit_secs: f64 },
    Cancelled { stage: Stage },
    IoFailure { message: String },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    /// Captured stdout for successful runs.
    pub fn stdout(&self) -> Option<&str> {
        match self {
            ExecutionResult::Success { stdout } => Some(stdout),
            _ => None,
        }
    }

    /// Short machine-friendly label.
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionResult::Success { .. } => "success",
            ExecutionResult::CompileFailure { .. } => "compile_failure",
            ExecutionResult::RuntimeFailure { .. } => "runtime_failure",
            ExecutionResult::ToolchainUnavailable { .. } => "toolchain_unavailable",
            ExecutionResult::Timeout { .. } => "timeout",
            ExecutionResult::Cancelled { .. } => "cancelled",
            ExecutionResult::IoFailure { .. } => "io_failure",
        }
    }

    /// Human-readable text shown in place of program output. Failures carry
    /// a leading label; diagnostics follow verbatim.
    pub fn render(&self) -> String {
        match self {
            ExecutionResult::Success { stdout } => stdout.clone(),
            ExecutionResult::CompileFailure {
                compiler,
                diagnostic,
            } => format!("Compilation failed with {}:\n{}", compiler, diagnostic),
            ExecutionResult::RuntimeFailure { diagnostic, .. } => {
                format!("Program crashed:\n{}", diagnostic)
            }
            ExecutionResult::ToolchainUnavailable { detail } => detail.clone(),
            ExecutionResult::Timeout { stage, limit_secs } => {
                format!("Timed out after {:.1}s during {}", limit_secs, stage)
            }
            ExecutionResult::Cancelled { stage } => format!("Cancelled during {}", stage),
            ExecutionResult::IoFailure { message } => format!("An error occurred: {}", message),
        }
    }
}

/// Result of running source code in the sandbox.
///
/// `exception` is set when the program raised (or the interpreter exited
/// non-zero); the same line is also embedded in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRun {
    pub result: ExecutionResult,
    pub exception: Option<String>,
}

impl SourceRun {
    pub fn raised(&self) -> bool {
        self.exception.is_some()
    }
}

/// Result of one persist → build → run cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Stages attempted, in order.
    pub stages: Vec<Stage>,
    pub compiler: Option<CompilerId>,
    pub result: ExecutionResult,
}

// ============================================================================
// transcc.yaml
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransccConfig {
    /// Schema version (must be "1.0")
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub backends: BackendsConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub toolchain: ToolchainContext,

    #[serde(default)]
    pub compare: CompareConfig,
}

impl Default for TransccConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            backends: BackendsConfig::default(),
            source: SourceConfig::default(),
            toolchain: ToolchainContext::default(),
            compare: CompareConfig::default(),
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

/// One entry per backend variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendsConfig {
    #[serde(default = "default_gpt")]
    pub gpt: BackendConfig,

    #[serde(default = "default_claude")]
    pub claude: BackendConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            gpt: default_gpt(),
            claude: default_claude(),
        }
    }
}

/// Connection settings for a streaming model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Model identifier sent upstream
    pub model: String,

    /// API root (no trailing path)
    pub base_url: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Generation cap (required by some providers)
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_gpt() -> BackendConfig {
    BackendConfig {
        model: "gpt-4o".to_string(),
        base_url: "https://api.openai.com/v1".to_string(),
        api_key_env: "OPENAI_API_KEY".to_string(),
        max_tokens: None,
    }
}

fn default_claude() -> BackendConfig {
    BackendConfig {
        model: "claude-3-5-sonnet-20240620".to_string(),
        base_url: "https://api.anthropic.com".to_string(),
        api_key_env: "ANTHROPIC_API_KEY".to_string(),
        max_tokens: Some(2000),
    }
}

/// Source sandbox settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Wall-clock limit; 0 disables
    #[serde(default = "default_source_timeout")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            timeout_secs: default_source_timeout(),
        }
    }
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_source_timeout() -> u64 {
    600
}

fn default_run_timeout() -> u64 {
    60
}

fn default_build_timeout() -> u64 {
    120
}

/// Where and how translated code is built and run. One context per
/// concurrent session: two contexts with distinct `work_dir`s never share
/// files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainContext {
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    #[serde(default = "default_source_file")]
    pub source_file: String,

    /// Executable name; `.exe` is appended on Windows
    #[serde(default = "default_artifact")]
    pub artifact: String,

    /// Language standard passed as `-std=<std>`
    #[serde(default = "default_std")]
    pub std: String,

    #[serde(default = "default_flags")]
    pub flags: Vec<String>,

    /// Candidates probed in order
    #[serde(default = "default_compilers")]
    pub compilers: Vec<String>,

    #[serde(default = "default_build_timeout")]
    pub build_timeout_secs: u64,

    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
}

impl Default for ToolchainContext {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            source_file: default_source_file(),
            artifact: default_artifact(),
            std: default_std(),
            flags: default_flags(),
            compilers: default_compilers(),
            build_timeout_secs: default_build_timeout(),
            run_timeout_secs: default_run_timeout(),
        }
    }
}

impl ToolchainContext {
    /// Same settings, rooted at another directory.
    pub fn with_work_dir(&self, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..self.clone()
        }
    }

    pub fn source_path(&self) -> PathBuf {
        self.work_dir.join(&self.source_file)
    }

    pub fn artifact_path(&self) -> PathBuf {
        if cfg!(windows) && !self.artifact.ends_with(".exe") {
            self.work_dir.join(format!("{}.exe", self.artifact))
        } else {
            self.work_dir.join(&self.artifact)
        }
    }

    pub fn build_timeout(&self) -> Option<Duration> {
        secs_limit(self.build_timeout_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        secs_limit(self.run_timeout_secs)
    }
}

/// Convert a seconds setting into an optional limit (0 = unlimited).
pub fn secs_limit(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_source_file() -> String {
    "optimized.cpp".to_string()
}

fn default_artifact() -> String {
    "optimized".to_string()
}

fn default_std() -> String {
    "c++17".to_string()
}

fn default_flags() -> Vec<String> {
    vec!["-O3".to_string()]
}

fn default_compilers() -> Vec<String> {
    vec!["g++".to_string(), "clang++".to_string()]
}

/// Output comparison settings for `verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareConfig {
    /// Regexes; matching lines are dropped from both outputs
    #[serde(default = "default_ignore_lines")]
    pub ignore_lines: Vec<String>,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            ignore_lines: default_ignore_lines(),
        }
    }
}

fn default_ignore_lines() -> Vec<String> {
    vec!["(?i)^execution time".to_string()]
}
