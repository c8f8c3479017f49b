use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{env, error::FrameworkError};

/// Upper bound on captured output per stream; tool logs past this point are
/// truncated from the front so the tail (where errors land) survives.
const MAX_CAPTURE_BYTES: usize = 1024 * 1024;

/// Captured output of a finished provider tool invocation.
#[derive(Clone, Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Combined stdout/stderr for error surfaces.
    #[must_use]
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Run an external provider tool to completion with bounded capture.
///
/// The child is killed when the cancellation token fires. Non-zero exit
/// surfaces as `CommandFailed` carrying the combined output.
pub async fn run_tool(
    mut command: Command,
    description: &str,
    cancel: &CancellationToken,
) -> Result<ToolOutput, FrameworkError> {
    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(command = description, "spawning provider tool");

    let child = command
        .spawn()
        .map_err(|source| map_spawn_error(description, source))?;

    let output = tokio::select! {
        output = child.wait_with_output() => {
            output.map_err(|source| FrameworkError::UnknownError {
                message: format!("failed to collect output of `{description}`"),
                source: Some(Box::new(source)),
            })?
        }
        () = cancel.cancelled() => {
            warn!(command = description, "provider tool cancelled; child killed");
            return Err(FrameworkError::cancelled(description));
        }
    };

    let tool_output = ToolOutput {
        stdout: bounded_utf8(&output.stdout),
        stderr: bounded_utf8(&output.stderr),
    };

    if env::debug_commands() {
        debug!(
            command = description,
            stdout = %tool_output.stdout,
            stderr = %tool_output.stderr,
            "provider tool output"
        );
    }

    if output.status.success() {
        Ok(tool_output)
    } else {
        Err(FrameworkError::CommandFailed {
            command: description.to_owned(),
            exit_code: output.status.code(),
            stderr: tool_output.combined(),
        })
    }
}

/// Convenience wrapper returning trimmed stdout.
pub async fn run_tool_stdout(
    command: Command,
    description: &str,
    cancel: &CancellationToken,
) -> Result<String, FrameworkError> {
    run_tool(command, description, cancel)
        .await
        .map(|output| output.stdout.trim().to_owned())
}

fn map_spawn_error(description: &str, source: std::io::Error) -> FrameworkError {
    match source.kind() {
        std::io::ErrorKind::NotFound => FrameworkError::CommandFailed {
            command: description.to_owned(),
            exit_code: None,
            stderr: "executable not found on PATH".to_owned(),
        },
        std::io::ErrorKind::PermissionDenied => FrameworkError::PermissionDenied {
            message: format!("cannot execute `{description}`"),
        },
        _ => FrameworkError::UnknownError {
            message: format!("failed to spawn `{description}`"),
            source: Some(Box::new(source)),
        },
    }
}

fn bounded_utf8(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_CAPTURE_BYTES {
        return text.into_owned();
    }
    let start = text.len() - MAX_CAPTURE_BYTES;
    let start = text
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| i >= start)
        .unwrap_or(start);
    format!("[... truncated ...]{}", &text[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nonzero_exit_surfaces_command_failed() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("echo boom >&2; exit 3");

        let err = run_tool(command, "sh -c boom", &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            FrameworkError::CommandFailed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert!(stderr.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_executable_reports_command_failed() {
        let command = Command::new("definitely-not-a-real-tool-xyz");
        let err = run_tool(command, "missing tool", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_the_child() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("sleep 30");

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = run_tool(command, "sh -c sleep", &cancel).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn oversized_output_keeps_the_tail() {
        let bytes = vec![b'a'; MAX_CAPTURE_BYTES + 64];
        let text = bounded_utf8(&bytes);
        assert!(text.starts_with("[... truncated ...]"));
        assert!(text.len() <= MAX_CAPTURE_BYTES + 32);
    }
}
