//! Subprocess execution for CLI-based backends
//!
//! The 1Password and Bitwarden adapters talk to their vendor CLIs through
//! [`CommandRunner`], so tests can script CLI output without the binaries.

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use tracing::debug;

use crate::errors::{BackendError, BackendOperation, BackendResult};
use crate::secrets::types::SecretString;

/// Captured result of one CLI invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self { success: true, code: Some(0), stdout: stdout.into(), stderr: String::new() }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self { success: false, code: Some(code), stdout: String::new(), stderr: stderr.into() }
    }
}

/// Trait for executing external commands
#[async_trait]
pub trait CommandRunner: Send + Sync + fmt::Debug {
    /// Run `program` with `args`. `env` values are added to the child
    /// environment only and never logged.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        env: &[(String, SecretString)],
    ) -> std::io::Result<CommandOutput>;
}

/// Production implementation on `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        env: &[(String, SecretString)],
    ) -> std::io::Result<CommandOutput> {
        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in env {
            command.env(key, value.expose_secret());
        }

        let output = command.output().await?;
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run a CLI command and return its stdout, mapping failures to
/// [`BackendError`] with the CLI's own message.
pub async fn run_checked(
    runner: &dyn CommandRunner,
    operation: BackendOperation,
    resource: &str,
    program: &str,
    args: &[String],
    env: &[(String, SecretString)],
) -> BackendResult<String> {
    debug!(program, operation = %operation, resource, "Running backend CLI");

    let output = runner.run(program, args, env).await.map_err(|e| {
        let message = if e.kind() == std::io::ErrorKind::NotFound {
            format!("'{program}' executable not found on PATH")
        } else {
            format!("failed to run '{program}': {e}")
        };
        BackendError::new(operation, resource, message).with_source(e)
    })?;

    if output.success {
        return Ok(output.stdout);
    }

    let message = match output.stderr.trim() {
        "" => output.stdout.trim().to_string(),
        stderr => stderr.to_string(),
    };
    let message = if message.is_empty() {
        format!("'{program}' exited with status {}", output.code.unwrap_or(-1))
    } else {
        message
    };
    Err(BackendError::new(operation, resource, message))
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedRunner;
    use super::*;

    #[tokio::test]
    async fn test_run_checked_returns_stdout() {
        let runner = ScriptedRunner::new([CommandOutput::ok("value\n")]);
        let out = run_checked(&runner, BackendOperation::GetSecret, "x", "op", &[], &[]).await;
        assert_eq!(out.unwrap(), "value\n");
    }

    #[tokio::test]
    async fn test_run_checked_uses_stderr_as_message() {
        let runner = ScriptedRunner::new([CommandOutput::failed(1, "Not found.\n")]);
        let err = run_checked(&runner, BackendOperation::GetSecret, "x", "bw", &[], &[])
            .await
            .unwrap_err();
        assert_eq!(err.message, "Not found.");
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let runner = ScriptedRunner::new([]);
        let err = run_checked(&runner, BackendOperation::ListItems, "", "op", &[], &[])
            .await
            .unwrap_err();
        assert!(err.message.contains("not found on PATH"));
    }

    #[tokio::test]
    async fn test_system_runner_executes() {
        let out = SystemCommandRunner.run("sh", &["-c".into(), "printf hi".into()], &[]).await;
        if let Ok(out) = out {
            assert!(out.success);
            assert_eq!(out.stdout, "hi");
        }
    }
}
