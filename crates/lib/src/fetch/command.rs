//! Subprocess execution for fetchers.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use super::FetchError;

/// Captured output of a successful command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
  pub stdout: String,
  pub stderr: String,
}

/// Run `program` with `args`, killing it if `timeout` elapses.
///
/// A non-zero exit status is an error carrying the trimmed stderr.
pub async fn run(program: &str, args: &[&str], timeout: Option<Duration>) -> Result<CommandOutput, FetchError> {
  let cmdline = std::iter::once(program).chain(args.iter().copied()).collect::<Vec<_>>().join(" ");
  debug!(cmd = %cmdline, "spawning process");

  let child = Command::new(program)
    .args(args)
    .stdin(Stdio::null())
    .kill_on_drop(true)
    .output();

  let output = match timeout {
    Some(limit) => tokio::time::timeout(limit, child)
      .await
      .map_err(|_| FetchError::Timeout {
        cmd: cmdline.clone(),
        seconds: limit.as_secs(),
      })?,
    None => child.await,
  }
  .map_err(|e| FetchError::Spawn {
    cmd: cmdline.clone(),
    message: e.to_string(),
  })?;

  let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
  let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

  if !output.status.success() {
    return Err(FetchError::CmdFailed {
      cmd: cmdline,
      code: output.status.code(),
      stderr: stderr.trim().to_string(),
    });
  }

  Ok(CommandOutput { stdout, stderr })
}

/// Run a command line through `/bin/sh -c`.
pub async fn run_shell(cmd: &str, timeout: Option<Duration>) -> Result<CommandOutput, FetchError> {
  run("/bin/sh", &["-c", cmd], timeout).await
}
