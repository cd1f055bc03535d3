//! Task execution against the external client.
//!
//! [`TaskExecutor`] is the seam between the worker pool and the outside
//! world. [`ShellExecutor`] runs the rendered command through `bash -c`,
//! feeds the key password on stdin and captures both output streams.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::Instant;

use crate::profiler::error::ExecError;
use crate::profiler::secret::SecretValue;
use crate::profiler::task::TaskDescriptor;

/// Captured result of one command invocation.
#[derive(Debug, Clone)]
pub struct Execution {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
    pub result: Result<(), ExecError>,
}

/// Runs one task and reports what happened.
///
/// Implementations must not panic on failure; every outcome is reported
/// through [`Execution::result`].
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &TaskDescriptor) -> Execution;
}

/// Executes tasks as `bash -c <command>` child processes.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
    secret: SecretValue,
}

impl ShellExecutor {
    pub fn new(secret: SecretValue) -> Self {
        Self {
            shell: "bash".to_string(),
            secret,
        }
    }

    /// Use a different shell binary (must accept `-c <command>`).
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Run an already rendered command line.
    pub async fn run_command(&self, command: &str) -> Execution {
        let start = Instant::now();
        let outcome = self.spawn_and_wait(command).await;
        let elapsed = start.elapsed();

        match outcome {
            Ok((stdout, stderr, status)) => {
                let result = if status.success() {
                    Ok(())
                } else {
                    Err(ExecError::NonZeroExit {
                        code: status.code(),
                        stderr: stderr.clone(),
                    })
                };
                Execution {
                    stdout,
                    stderr,
                    elapsed,
                    result,
                }
            }
            Err(err) => Execution {
                stdout: String::new(),
                stderr: String::new(),
                elapsed,
                result: Err(err),
            },
        }
    }

    async fn spawn_and_wait(
        &self,
        command: &str,
    ) -> Result<(String, String, std::process::ExitStatus), ExecError> {
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::Spawn {
                message: e.to_string(),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = self.secret.stdin_payload();
            // A child that exits without reading stdin closes the pipe early.
            if let Err(e) = stdin.write_all(&payload).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(ExecError::Io {
                        message: e.to_string(),
                    });
                }
            }
        }

        let output = child.wait_with_output().await.map_err(|e| ExecError::Io {
            message: e.to_string(),
        })?;

        Ok((
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
            output.status,
        ))
    }
}

#[async_trait]
impl TaskExecutor for ShellExecutor {
    async fn execute(&self, task: &TaskDescriptor) -> Execution {
        self.run_command(&task.render_command()).await
    }
}
