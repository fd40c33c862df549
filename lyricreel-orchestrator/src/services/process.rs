//! External process invocation
//!
//! Every external tool (analysis script, ffmpeg) is launched through
//! [`CommandRunner`] so the pipeline can be exercised with a fake runner.

use async_trait::async_trait;
use lyricreel_common::Error;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::process::Command;

/// Process launch errors
#[derive(Debug, ThisError)]
pub enum ProcessError {
    /// Program not found on PATH
    #[error("{program} not found")]
    NotFound { program: String },

    /// Spawn or wait failed
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Process exceeded its time budget and was killed
    #[error("{program} timed out after {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
}

impl ProcessError {
    /// Convert to the pipeline error, attributing it to `service`
    pub fn into_external(self, service: &'static str) -> Error {
        Error::external(service, self.to_string())
    }
}

/// Captured result of one process run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout and stderr joined, as shown in renderer error reports
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Process-invocation seam
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, killing it after `timeout`
    ///
    /// A non-zero exit is NOT an error here; callers inspect
    /// [`CommandOutput::exit_code`].
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> std::result::Result<CommandOutput, ProcessError>;
}

/// [`CommandRunner`] backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> std::result::Result<CommandOutput, ProcessError> {
        tracing::debug!(program, args = ?args, timeout_secs = timeout.as_secs(), "Spawning process");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ProcessError::NotFound {
                    program: program.to_string(),
                },
                _ => ProcessError::Spawn {
                    program: program.to_string(),
                    source: e,
                },
            })?;

        // Dropping the wait future on timeout kills the child (kill_on_drop)
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ProcessError::Timeout {
                program: program.to_string(),
                timeout,
            })?
            .map_err(|e| ProcessError::Spawn {
                program: program.to_string(),
                source: e,
            })?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_output_skips_empty_streams() {
        let out = CommandOutput {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "bad filter".into(),
        };
        assert_eq!(out.combined(), "bad filter");
        assert!(!out.success());

        let both = CommandOutput {
            exit_code: Some(0),
            stdout: "a".into(),
            stderr: "b".into(),
        };
        assert_eq!(both.combined(), "a\nb");
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let runner = SystemCommandRunner::new();
        let err = runner
            .run("lyricreel-no-such-binary", &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_exit_code_and_streams() {
        let runner = SystemCommandRunner::new();
        let args = vec!["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()];
        let out = runner.run("sh", &args, Duration::from_secs(10)).await.unwrap();

        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_process_times_out() {
        let runner = SystemCommandRunner::new();
        let args = vec!["5".to_string()];
        let err = runner
            .run("sleep", &args, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
    }
}
