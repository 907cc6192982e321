//! TC-010: Child process execution — capture, timeout, cancellation.
//!
//! Every external program (interpreter, compiler probe, compiler, built
//! artifact) goes through [`run_captured`]. On Unix the child leads its own
//! process group so a timeout or cancellation kills everything it spawned.

use std::process::{Command, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Output from a child process that ran to completion.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// How a child process ended.
#[derive(Debug, Clone)]
pub enum Completion {
    /// Exited on its own (signal deaths report exit code -1).
    Finished(ExecOutput),
    /// Killed after exceeding the wall-clock limit.
    TimedOut(Duration),
    /// Killed because the caller cancelled.
    Cancelled,
}

/// Run `cmd` to completion with stdout and stderr captured.
///
/// `stdin` is written from a separate task so a child that never reads its
/// input cannot deadlock the caller; `None` connects stdin to null.
pub async fn run_captured(
    mut cmd: Command,
    stdin: Option<String>,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<Completion, String> {
    let program = cmd.get_program().to_string_lossy().to_string();

    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut cmd = tokio::process::Command::from(cmd);
    cmd.kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| format!("failed to spawn {}: {}", program, e))?;
    let pid = child.id();

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        tokio::spawn(async move {
            // A child that exits early closes the pipe; that is not our error.
            let _ = pipe.write_all(input.as_bytes()).await;
            let _ = pipe.shutdown().await;
        });
    }

    let deadline = async {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        output = child.wait_with_output() => {
            let output = output.map_err(|e| format!("wait error for {}: {}", program, e))?;
            Ok(Completion::Finished(ExecOutput {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }))
        }
        _ = deadline => {
            kill_group(pid);
            tracing::warn!(program = %program, ?timeout, "child exceeded wall-clock limit");
            Ok(Completion::TimedOut(timeout.unwrap_or_default()))
        }
        _ = cancel.cancelled() => {
            kill_group(pid);
            tracing::info!(program = %program, "child cancelled");
            Ok(Completion::Cancelled)
        }
    }
}

/// Kill the process group led by `pid`. The dropped tokio child handles the
/// leader itself through `kill_on_drop`.
#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(raw) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        tracing::debug!(pid = raw, error = %e, "killpg failed (group already gone?)");
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}
