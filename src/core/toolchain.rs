//! TC-008: Toolchain manager — discover a compiler, then persist, build and
//! run translated code.
//!
//! One [`Toolchain`] owns one [`ToolchainContext`]. Its cycles are
//! serialized by an async mutex so the source file and artifact are never
//! written by two cycles at once. Sessions that need real concurrency use
//! separate contexts (distinct `work_dir`s).
//!
//! Each stage runs exactly once per cycle. A failed stage ends the cycle:
//! `run` never follows a failed `build`.

use super::fence;
use super::types::{CompilerId, CycleReport, ExecutionResult, Stage, ToolchainContext};
use crate::process::{self, Completion};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of the build stage.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Built(PathBuf),
    Failed(ExecutionResult),
}

/// Probe `candidates` in order with `--version`; the first that exits zero
/// wins. On Windows the first candidate is used without probing.
pub async fn discover_compiler(
    candidates: &[String],
    cancel: &CancellationToken,
) -> Result<CompilerId, ExecutionResult> {
    if cfg!(windows) {
        if let Some(first) = candidates.first() {
            return Ok(CompilerId(first.clone()));
        }
    }

    for candidate in candidates {
        let mut cmd = Command::new(candidate);
        cmd.arg("--version");
        match process::run_captured(cmd, None, Some(PROBE_TIMEOUT), cancel).await {
            Ok(Completion::Finished(out)) if out.success() => {
                tracing::info!(compiler = %candidate, "compiler discovered");
                return Ok(CompilerId(candidate.clone()));
            }
            Ok(Completion::Cancelled) => {
                return Err(ExecutionResult::Cancelled {
                    stage: Stage::Discover,
                })
            }
            Ok(other) => tracing::debug!(compiler = %candidate, outcome = ?other, "probe failed"),
            Err(e) => tracing::debug!(compiler = %candidate, error = %e, "probe failed"),
        }
    }

    Err(ExecutionResult::ToolchainUnavailable {
        detail: format!(
            "No suitable C++ compiler found (tried: {})",
            candidates.join(", ")
        ),
    })
}

pub struct Toolchain {
    ctx: ToolchainContext,
    cycle: Mutex<()>,
}

impl Toolchain {
    pub fn new(ctx: ToolchainContext) -> Self {
        Self {
            ctx,
            cycle: Mutex::new(()),
        }
    }

    pub fn context(&self) -> &ToolchainContext {
        &self.ctx
    }

    /// Write translated code to the context's source file, overwriting it.
    /// Leftover fence markers are stripped.
    pub fn persist(&self, code: &str) -> Result<PathBuf, ExecutionResult> {
        let io_failure = |message: String| ExecutionResult::IoFailure { message };

        std::fs::create_dir_all(&self.ctx.work_dir).map_err(|e| {
            io_failure(format!(
                "cannot create {}: {}",
                self.ctx.work_dir.display(),
                e
            ))
        })?;

        let path = self.ctx.source_path();
        let cleaned = if fence::contains_fence(code) {
            tracing::debug!("fence markers left in translated code, stripping");
            fence::strip(code)
        } else {
            code.to_string()
        };
        std::fs::write(&path, cleaned)
            .map_err(|e| io_failure(format!("cannot write {}: {}", path.display(), e)))?;
        Ok(path)
    }

    /// Compile the persisted source. Compiler stderr is kept verbatim.
    pub async fn build(&self, compiler: &CompilerId, cancel: &CancellationToken) -> BuildOutcome {
        let (source, artifact) = match (absolute(&self.ctx.source_path()), absolute(&self.ctx.artifact_path())) {
            (Ok(s), Ok(a)) => (s, a),
            (Err(message), _) | (_, Err(message)) => {
                return BuildOutcome::Failed(ExecutionResult::IoFailure { message })
            }
        };

        // A stale executable from an earlier cycle must never be run.
        if let Err(e) = std::fs::remove_file(&artifact) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return BuildOutcome::Failed(ExecutionResult::IoFailure {
                    message: format!("cannot remove {}: {}", artifact.display(), e),
                });
            }
        }

        let mut cmd = Command::new(&compiler.0);
        cmd.args(&self.ctx.flags)
            .arg(format!("-std={}", self.ctx.std))
            .arg("-o")
            .arg(&artifact)
            .arg(&source)
            .current_dir(&self.ctx.work_dir);

        match process::run_captured(cmd, None, self.ctx.build_timeout(), cancel).await {
            Ok(Completion::Finished(out)) if out.success() => {
                tracing::info!(compiler = %compiler, artifact = %artifact.display(), "build succeeded");
                BuildOutcome::Built(artifact)
            }
            Ok(Completion::Finished(out)) => {
                tracing::info!(compiler = %compiler, exit_code = out.exit_code, "build failed");
                BuildOutcome::Failed(ExecutionResult::CompileFailure {
                    compiler: compiler.clone(),
                    diagnostic: out.stderr,
                })
            }
            Ok(Completion::TimedOut(limit)) => BuildOutcome::Failed(ExecutionResult::Timeout {
                stage: Stage::Build,
                limit_secs: limit.as_secs_f64(),
            }),
            Ok(Completion::Cancelled) => BuildOutcome::Failed(ExecutionResult::Cancelled {
                stage: Stage::Build,
            }),
            Err(message) => BuildOutcome::Failed(ExecutionResult::IoFailure { message }),
        }
    }

    /// Run a built artifact with no arguments and no stdin.
    pub async fn run(&self, artifact: &Path, cancel: &CancellationToken) -> ExecutionResult {
        let mut cmd = Command::new(artifact);
        cmd.current_dir(&self.ctx.work_dir);

        match process::run_captured(cmd, None, self.ctx.run_timeout(), cancel).await {
            Ok(Completion::Finished(out)) if out.success() => {
                ExecutionResult::Success { stdout: out.stdout }
            }
            Ok(Completion::Finished(out)) => {
                tracing::info!(exit_code = out.exit_code, "translated program failed");
                ExecutionResult::RuntimeFailure {
                    exit_code: out.exit_code,
                    diagnostic: out.stderr,
                }
            }
            Ok(Completion::TimedOut(limit)) => ExecutionResult::Timeout {
                stage: Stage::Run,
                limit_secs: limit.as_secs_f64(),
            },
            Ok(Completion::Cancelled) => ExecutionResult::Cancelled { stage: Stage::Run },
            Err(message) => ExecutionResult::IoFailure { message },
        }
    }

    /// One full cycle: discover → persist → build → run.
    pub async fn execute(&self, code: &str, cancel: &CancellationToken) -> CycleReport {
        let _cycle = self.cycle.lock().await;
        let mut report = CycleReport {
            stages: vec![Stage::Discover],
            compiler: None,
            result: ExecutionResult::Success {
                stdout: String::new(),
            },
        };

        let compiler = match discover_compiler(&self.ctx.compilers, cancel).await {
            Ok(c) => c,
            Err(result) => {
                tracing::warn!(outcome = result.label(), "no compiler, cycle stopped");
                report.result = result;
                return report;
            }
        };
        report.compiler = Some(compiler.clone());

        report.stages.push(Stage::Persist);
        if let Err(result) = self.persist(code) {
            report.result = result;
            return report;
        }

        report.stages.push(Stage::Build);
        let artifact = match self.build(&compiler, cancel).await {
            BuildOutcome::Built(path) => path,
            BuildOutcome::Failed(result) => {
                report.result = result;
                return report;
            }
        };

        report.stages.push(Stage::Run);
        report.result = self.run(&artifact, cancel).await;
        report
    }
}

fn absolute(path: &Path) -> Result<PathBuf, String> {
    std::path::absolute(path).map_err(|e| format!("cannot resolve {}: {}", path.display(), e))
}
