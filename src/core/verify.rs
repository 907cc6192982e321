//! TC-012: Verification — translate, run both programs, compare output.
//!
//! Lines matching any ignore pattern (timing lines by default) are dropped on
//! both sides and trailing whitespace is ignored before comparing.

use super::digest;
use super::error::PipelineError;
use super::orchestrator::{self, Orchestrator};
use super::sandbox::SourceSandbox;
use super::toolchain::Toolchain;
use super::types::{CompareConfig, CycleReport, ExecutionResult, SourceProgram, SourceRun, Translation};
use regex::Regex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutputComparison {
    /// Normalised outputs are identical.
    Match { lines: usize, digest: String },
    /// First differing line (1-based, counted after normalisation). A side
    /// that ran out of lines is `None`.
    Diverged {
        line: usize,
        source: Option<String>,
        target: Option<String>,
    },
    Incomparable { reason: String },
}

impl OutputComparison {
    pub fn is_match(&self) -> bool {
        matches!(self, OutputComparison::Match { .. })
    }
}

/// Compiled ignore patterns.
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    ignore: Vec<Regex>,
}

impl Comparator {
    pub fn new(patterns: &[String]) -> Result<Self, PipelineError> {
        let ignore = patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| PipelineError::Config(format!("ignore_lines '{}': {}", p, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ignore })
    }

    pub fn from_config(config: &CompareConfig) -> Result<Self, PipelineError> {
        Self::new(&config.ignore_lines)
    }

    fn normalize<'a>(&self, output: &'a str) -> Vec<&'a str> {
        output
            .lines()
            .map(str::trim_end)
            .filter(|line| !self.ignore.iter().any(|re| re.is_match(line)))
            .collect()
    }

    /// Compare a source run against a translated-program result.
    pub fn compare(&self, source: &SourceRun, target: &ExecutionResult) -> OutputComparison {
        if let Some(exception) = &source.exception {
            return OutputComparison::Incomparable {
                reason: format!("source program raised: {}", exception),
            };
        }
        let (Some(source_out), Some(target_out)) = (source.result.stdout(), target.stdout()) else {
            let failed = if source.result.is_success() {
                ("target", target.label())
            } else {
                ("source", source.result.label())
            };
            return OutputComparison::Incomparable {
                reason: format!("{} did not succeed ({})", failed.0, failed.1),
            };
        };
        self.compare_output(source_out, target_out)
    }

    /// Compare two raw outputs.
    pub fn compare_output(&self, source: &str, target: &str) -> OutputComparison {
        let left = self.normalize(source);
        let right = self.normalize(target);

        let width = left.len().max(right.len());
        for i in 0..width {
            let (l, r) = (left.get(i).copied(), right.get(i).copied());
            if l != r {
                return OutputComparison::Diverged {
                    line: i + 1,
                    source: l.map(str::to_string),
                    target: r.map(str::to_string),
                };
            }
        }

        OutputComparison::Match {
            lines: left.len(),
            digest: digest::hash_lines(left.iter().copied()),
        }
    }
}

/// Everything `verify` observed.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub translation: Translation,
    pub source: SourceRun,
    pub target: CycleReport,
    pub comparison: OutputComparison,
}

/// Translate `source` with `selector`, run both programs, and compare.
///
/// Translation failures and cancellation while streaming are errors;
/// execution failures are reported in the result.
pub async fn verify(
    orchestrator: &Orchestrator,
    sandbox: &SourceSandbox,
    toolchain: &Toolchain,
    comparator: &Comparator,
    source: &SourceProgram,
    selector: &str,
    cancel: &CancellationToken,
) -> Result<VerificationReport, PipelineError> {
    let stream = orchestrator.translate(source, selector, cancel.clone()).await?;
    let backend = orchestrator.select(selector)?.kind().label();
    let translation = orchestrator::drain(backend, stream, cancel).await?;

    let source_run = sandbox.run_source(source, cancel).await;
    let target = toolchain.execute(&translation.code, cancel).await;
    let comparison = comparator.compare(&source_run, &target.result);

    match &comparison {
        OutputComparison::Match { lines, .. } => tracing::info!(lines, "outputs match"),
        OutputComparison::Diverged { line, .. } => tracing::warn!(line, "outputs diverge"),
        OutputComparison::Incomparable { reason } => tracing::warn!(%reason, "outputs not comparable"),
    }

    Ok(VerificationReport {
        translation,
        source: source_run,
        target,
        comparison,
    })
}
