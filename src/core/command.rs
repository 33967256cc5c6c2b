//! Subprocess execution.
//!
//! Used for the OS archiver and for `crontab`. Failures come back as
//! [`CommandError`] so each caller can report them under its own error kind.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::timeout;

use crate::util::format_duration;

/// Default timeout for short commands (crontab).
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a command produced no exit status.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0} is not installed")]
    NotFound(String),

    /// The child was killed after running past its deadline.
    #[error("{program} timed out after {}", format_duration(*.after))]
    TimedOut { program: String, after: Duration },

    #[error("{program} failed: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Output from a command. Non-UTF-8 bytes are replaced, never rejected.
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Check if command succeeded (exit code 0).
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<String> {
    let mut bytes = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut bytes).await?;
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Run a command with timeout.
///
/// # Errors
///
/// Returns error if:
/// - The program is not installed ([`CommandError::NotFound`])
/// - The command times out (the child is killed)
/// - The command fails to execute
pub async fn run_command(
    program: &str,
    args: &[String],
    timeout_duration: Duration,
) -> Result<CommandOutput, CommandError> {
    tracing::debug!(program, ?args, "Spawning command");

    let io_error = |source: std::io::Error| CommandError::Io {
        program: program.to_string(),
        source,
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CommandError::NotFound(program.to_string())
            } else {
                io_error(e)
            }
        })?;

    let result = timeout(timeout_duration, async {
        // Drain both pipes concurrently so a chatty child cannot block on a full pipe.
        let (stdout, stderr) =
            tokio::join!(drain(child.stdout.take()), drain(child.stderr.take()));
        let (stdout, stderr) = (stdout?, stderr?);

        let status = child.wait().await?;

        Ok::<_, std::io::Error>(CommandOutput {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(-1),
        })
    })
    .await;

    match result {
        Ok(Ok(output)) => {
            tracing::debug!(program, exit_code = output.exit_code, "Command finished");
            Ok(output)
        }
        Ok(Err(e)) => Err(io_error(e)),
        Err(_) => {
            let _ = child.kill().await;
            let _ = child.wait().await;
            Err(CommandError::TimedOut {
                program: program.to_string(),
                after: timeout_duration,
            })
        }
    }
}
