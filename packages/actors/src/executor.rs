//! Command executor seam and the shell implementation.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// Outcome of running one job command.
///
/// Execution problems (non-zero exit, spawn failure, timeout) are outcomes,
/// not errors: they feed the retry policy and never stop the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    Succeeded,
    /// Failed with the captured diagnostic.
    Failed(String),
}

impl ExecOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        ExecOutcome::Failed(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecOutcome::Succeeded)
    }
}

/// Future type for async executors.
pub type ExecFuture = Pin<Box<dyn Future<Output = ExecOutcome> + Send>>;

/// Runs job commands.
pub trait Executor: Send + Sync + 'static {
    /// Run `command` to completion and report how it went.
    fn execute(&self, command: &str) -> ExecFuture;
}

/// Runs commands through `sh -c`, killing them after a timeout.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    timeout: Duration,
}

impl ShellExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Executor for ShellExecutor {
    fn execute(&self, command: &str) -> ExecFuture {
        let command = command.to_string();
        let timeout = self.timeout;

        Box::pin(async move {
            let child = Command::new("sh")
                .arg("-c")
                .arg(&command)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn();

            let child = match child {
                Ok(child) => child,
                Err(e) => return ExecOutcome::failed(format!("failed to spawn command: {}", e)),
            };

            // Dropping the child on timeout kills it.
            let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    return ExecOutcome::failed(format!("failed to wait for command: {}", e));
                }
                Err(_) => {
                    return ExecOutcome::failed(format!("timed out after {}s", timeout.as_secs()));
                }
            };

            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.trim().is_empty() {
                tracing::debug!(output = %stdout.trim_end(), "Command output");
            }

            if output.status.success() {
                return ExecOutcome::Succeeded;
            }

            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if !stderr.is_empty() {
                ExecOutcome::failed(stderr)
            } else {
                match output.status.code() {
                    Some(code) => ExecOutcome::failed(format!("exited with status {}", code)),
                    None => ExecOutcome::failed("terminated by signal"),
                }
            }
        })
    }
}

/// A simple function-based executor.
pub struct FnExecutor<F>
where
    F: Fn(&str) -> ExecFuture + Send + Sync + 'static,
{
    executor: F,
}

impl<F> FnExecutor<F>
where
    F: Fn(&str) -> ExecFuture + Send + Sync + 'static,
{
    pub fn new(executor: F) -> Self {
        Self { executor }
    }
}

impl<F> Executor for FnExecutor<F>
where
    F: Fn(&str) -> ExecFuture + Send + Sync + 'static,
{
    fn execute(&self, command: &str) -> ExecFuture {
        (self.executor)(command)
    }
}
