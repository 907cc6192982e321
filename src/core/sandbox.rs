//! TC-006: Source sandbox — run Python with captured output and crash
//! containment.
//!
//! The program runs in a child interpreter under a small bootstrap that
//! executes it in fresh globals with `__name__ == "__main__"`. Exceptions
//! are caught by the bootstrap and reported inside the transcript; the
//! result is still `Success`, with [`SourceRun::exception`] set.

use super::types::{secs_limit, ExecutionResult, SourceConfig, SourceProgram, SourceRun, Stage};
use crate::process::{self, Completion};
use std::process::Command;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Prefix of the diagnostic line appended to the transcript.
pub const FAULT_PREFIX: &str = "Python execution error: ";

/// Marker the bootstrap writes to stderr when it caught an exception,
/// followed by the diagnostic line as a JSON string.
const FAULT_MARKER: &str = "__transcc_fault__";

const BOOTSTRAP: &str = r#"import sys
_program = sys.stdin.read()
try:
    exec(compile(_program, "<source>", "exec"), {"__name__": "__main__"})
except Exception as _error:
    import json
    _message = "Python execution error: " + str(_error)
    print(_message)
    sys.stdout.flush()
    sys.stderr.write("\n__transcc_fault__" + json.dumps(_message) + "\n")
"#;

pub struct SourceSandbox {
    interpreter: String,
    timeout: Option<Duration>,
}

impl SourceSandbox {
    pub fn new(interpreter: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(config.interpreter.clone(), secs_limit(config.timeout_secs))
    }

    /// Execute `code` and return its transcript.
    pub async fn run_source(&self, code: &SourceProgram, cancel: &CancellationToken) -> SourceRun {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-c").arg(BOOTSTRAP);

        let completion =
            process::run_captured(cmd, Some(code.as_str().to_string()), self.timeout, cancel).await;

        match completion {
            Ok(Completion::Finished(out)) => {
                let (stderr, caught) = split_fault(&out.stderr);
                let mut transcript = out.stdout;
                let exception = if caught.is_some() {
                    caught
                } else if out.exit_code != 0 {
                    let line = format!(
                        "{}interpreter exited with status {}",
                        FAULT_PREFIX, out.exit_code
                    );
                    if !transcript.is_empty() && !transcript.ends_with('\n') {
                        transcript.push('\n');
                    }
                    transcript.push_str(&line);
                    transcript.push('\n');
                    Some(line)
                } else {
                    None
                };

                if let Some(ref line) = exception {
                    tracing::info!(diagnostic = %line, "source program raised");
                }
                if !stderr.trim().is_empty() {
                    tracing::debug!(stderr = %stderr.trim(), "source program stderr");
                }

                SourceRun {
                    result: ExecutionResult::Success { stdout: transcript },
                    exception,
                }
            }
            Ok(Completion::TimedOut(limit)) => SourceRun {
                result: ExecutionResult::Timeout {
                    stage: Stage::Source,
                    limit_secs: limit.as_secs_f64(),
                },
                exception: None,
            },
            Ok(Completion::Cancelled) => SourceRun {
                result: ExecutionResult::Cancelled {
                    stage: Stage::Source,
                },
                exception: None,
            },
            Err(message) => {
                tracing::warn!(interpreter = %self.interpreter, error = %message, "interpreter unavailable");
                SourceRun {
                    result: ExecutionResult::IoFailure { message },
                    exception: None,
                }
            }
        }
    }
}

/// Split the bootstrap's fault record off the program's stderr. Returns
/// the remaining stderr and the diagnostic line, if an exception was caught.
fn split_fault(stderr: &str) -> (&str, Option<String>) {
    let Some(at) = stderr.rfind(FAULT_MARKER) else {
        return (stderr, None);
    };
    let record = stderr[at + FAULT_MARKER.len()..].lines().next().unwrap_or("");
    let line = serde_json::from_str::<String>(record).unwrap_or_else(|_| {
        tracing::debug!(record, "unreadable fault record");
        FAULT_PREFIX.trim_end().to_string()
    });
    (&stderr[..at], Some(line))
}
