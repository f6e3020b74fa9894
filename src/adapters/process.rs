//! Subprocess execution for analysis tools.
//!
//! Both pipes are always read to the end and closed before returning, so a
//! long history does not leak descriptors no matter how a tool exits.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use tracing::debug;

use crate::core::errors::{ExecutionFailure, QualeError, Result};

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

/// Run `program` with `args`, failing with [`QualeError::Execution`] on a
/// non-zero exit status.
pub async fn execute(
    tool: &str,
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
) -> Result<CommandOutput> {
    let command_line: Vec<String> = std::iter::once(program.to_string())
        .chain(args.iter().cloned())
        .collect();
    debug!(tool, command = %command_line.join(" "), "Spawning analysis tool");

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let start = Instant::now();
    let output = command.output().await.map_err(|e| {
        QualeError::io(
            format!("{tool} could not start `{}`", command_line.join(" ")),
            e,
        )
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    debug!(
        tool,
        status = ?output.status.code(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Analysis tool finished"
    );

    if !output.status.success() {
        return Err(QualeError::execution(ExecutionFailure {
            tool: tool.to_string(),
            command: command_line,
            exit_code: output.status.code(),
            stdout,
            stderr,
        }));
    }

    Ok(CommandOutput { stdout, stderr })
}
