//! Wrapper around the external GDevelop export CLI.
//!
//! The CLI is an opaque binary configured via `GDEVELOP_CLI_PATH`. Every
//! invocation is bounded by a timeout, and failures are classified so that
//! handlers can tell clients whether retrying makes sense without leaking
//! filesystem paths or raw tool output.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, instrument};

use crate::config::GDevelopConfig;

/// How much stderr to keep for diagnostics.
const STDERR_CAPTURE_LIMIT: usize = 4096;

/// A classified GDevelop CLI failure.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The configured CLI binary does not exist or is not executable.
    #[error("GDevelop CLI not found")]
    NotFound,

    /// The build exceeded its timeout and was killed.
    #[error("GDevelop CLI timed out after {seconds}s")]
    Timeout {
        /// Configured timeout that was exceeded.
        seconds: u64,
    },

    /// The CLI ran and exited with a non-zero status.
    #[error("GDevelop CLI exited with status {exit_code}")]
    Failed {
        /// Exit code, or -1 when killed by a signal.
        exit_code: i32,
        /// Captured stderr, truncated.
        stderr: String,
    },

    /// The process could not be spawned or awaited.
    #[error("GDevelop CLI I/O error: {0}")]
    Io(String),
}

impl CliError {
    /// Whether retrying the same request can plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::NotFound | Self::Timeout { .. } | Self::Io(_) => true,
            Self::Failed { .. } => false,
        }
    }

    /// Message safe to show end users. No paths, no raw tool output.
    #[must_use]
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::NotFound => {
                "The game build service is temporarily unavailable. Please try again later."
                    .to_string()
            }
            Self::Timeout { .. } => {
                "The game build took too long and was stopped. Try simplifying the game or retry."
                    .to_string()
            }
            Self::Failed { .. } => {
                "The game could not be built. Check the game for invalid objects or events."
                    .to_string()
            }
            Self::Io(_) => "The game build could not be started. Please try again.".to_string(),
        }
    }

    /// Structured detail for logs. Never sent to clients.
    #[must_use]
    pub fn debug_info(&self) -> serde_json::Value {
        match self {
            Self::NotFound => serde_json::json!({ "kind": "not_found" }),
            Self::Timeout { seconds } => {
                serde_json::json!({ "kind": "timeout", "seconds": seconds })
            }
            Self::Failed { exit_code, stderr } => serde_json::json!({
                "kind": "failed",
                "exit_code": exit_code,
                "stderr": stderr,
            }),
            Self::Io(detail) => serde_json::json!({ "kind": "io", "detail": detail }),
        }
    }
}

/// Handle to the configured CLI binary.
#[derive(Debug, Clone)]
pub struct GDevelopCli {
    cli_path: String,
}

impl GDevelopCli {
    /// Create a handle from the engine configuration.
    #[must_use]
    pub fn new(config: &GDevelopConfig) -> Self {
        Self {
            cli_path: config.cli_path.clone(),
        }
    }

    /// Run the CLI with the given arguments, killing it at the timeout.
    ///
    /// # Errors
    ///
    /// Returns a classified `CliError` on spawn failure, timeout, or a
    /// non-zero exit status.
    #[instrument(skip(self, args), fields(cli = %self.cli_path))]
    pub async fn run(&self, args: &[&str], timeout: Duration) -> Result<String, CliError> {
        debug!(?args, "Running GDevelop CLI");

        let child = Command::new(&self.cli_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, child).await {
            Err(_) => {
                return Err(CliError::Timeout {
                    seconds: timeout.as_secs(),
                })
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CliError::NotFound)
            }
            Ok(Err(e)) => return Err(CliError::Io(e.to_string())),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if stderr.len() > STDERR_CAPTURE_LIMIT {
                // Back off to a char boundary; a blind truncate panics when
                // the cut lands inside a multi-byte character.
                let mut cut = STDERR_CAPTURE_LIMIT;
                while !stderr.is_char_boundary(cut) {
                    cut -= 1;
                }
                stderr.truncate(cut);
            }
            return Err(CliError::Failed {
                exit_code: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(path: &str) -> GDevelopCli {
        GDevelopCli {
            cli_path: path.into(),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_not_found_and_retryable() {
        let err = cli("/nonexistent/gdexport")
            .run(&["--version"], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::NotFound));
        assert!(err.is_retryable());
        assert!(!err.user_friendly_message().contains("/nonexistent"));
    }

    #[tokio::test]
    async fn nonzero_exit_captures_stderr() {
        let err = cli("/bin/sh")
            .run(&["-c", "echo boom >&2; exit 3"], Duration::from_secs(5))
            .await
            .unwrap_err();
        match &err {
            CliError::Failed { exit_code, stderr } => {
                assert_eq!(*exit_code, 3);
                assert!(stderr.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_retryable());
        // stderr stays out of the user-facing message
        assert!(!err.user_friendly_message().contains("boom"));
    }

    #[tokio::test]
    async fn oversized_stderr_is_cut_on_a_char_boundary() {
        // 4095 spaces put the two-byte character astride the capture limit.
        let err = cli("/bin/sh")
            .run(
                &[
                    "-c",
                    "printf '%4095s' '' >&2; printf '\\303\\251tail' >&2; exit 3",
                ],
                Duration::from_secs(5),
            )
            .await
            .unwrap_err();
        match err {
            CliError::Failed { stderr, .. } => {
                // The straddling character is dropped whole.
                assert_eq!(stderr.len(), STDERR_CAPTURE_LIMIT - 1);
                assert!(stderr.ends_with(' '));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let err = cli("/bin/sh")
            .run(&["-c", "sleep 5"], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Timeout { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn successful_run_returns_stdout() {
        let out = cli("/bin/sh")
            .run(&["-c", "echo done"], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.trim(), "done");
    }
}
