//! Command execution bounded by cancellation scopes.
//!
//! # Responsibilities
//! - Spawn the requested command with stdout/stderr captured
//! - Race the process against the request's cancel scope
//! - Kill and reap the process when the scope fires (no orphans)
//! - Encode every failure into the result; execution never raises

use std::process::Stdio;
use std::time::{Instant, SystemTime};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::lifecycle::CancelScope;
use crate::model::{TaskRequest, TaskResult};

/// Error reported when the request carries no command.
pub const EMPTY_COMMAND_ERROR: &str = "empty command";

/// Error reported when the scope deadline expires before the process exits.
pub const TIMEOUT_ERROR: &str = "timeout exceeded";

/// Error reported when the scope is cancelled without a deadline, e.g. during
/// server shutdown.
pub const CANCELLED_ERROR: &str = "task cancelled";

/// Runs one task to completion under a cancel scope.
///
/// Implementations must not fail: every outcome, including spawn errors and
/// timeouts, is encoded in the returned [`TaskResult`].
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Execute the request and report its outcome.
    async fn execute_task(&self, scope: &CancelScope, request: &TaskRequest) -> TaskResult;
}

/// Production executor backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor;

impl CommandExecutor {
    /// Create a new command executor.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TaskExecutor for CommandExecutor {
    async fn execute_task(&self, scope: &CancelScope, request: &TaskRequest) -> TaskResult {
        let started = Instant::now();
        let mut result = TaskResult {
            command: request.command.clone(),
            executed_at: unix_timestamp(),
            duration_ms: 0.0,
            exit_code: 0,
            output: String::new(),
            error: String::new(),
        };

        if request.command.is_empty() {
            result.exit_code = -1;
            result.error = EMPTY_COMMAND_ERROR.to_string();
            result.duration_ms = elapsed_ms(started);
            return result;
        }

        let mut child = match Command::new(&request.command[0])
            .args(&request.command[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                result.exit_code = -1;
                result.error = format!("failed to start process: {}", e);
                result.duration_ms = elapsed_ms(started);
                return result;
            }
        };

        // Detached reader tasks keep the pipes drained while we wait, so a
        // chatty process cannot block on a full pipe, and partial output
        // survives a kill.
        let stdout_task = tokio::spawn(drain_pipe(child.stdout.take()));
        let stderr_task = tokio::spawn(drain_pipe(child.stderr.take()));

        tokio::select! {
            status = child.wait() => match status {
                Ok(status) => match status.code() {
                    Some(0) => {}
                    Some(code) => {
                        result.exit_code = code;
                        result.error = format!("exit status {}", code);
                    }
                    None => {
                        // Terminated by a signal: no exit code exists
                        result.exit_code = -1;
                        result.error = status.to_string();
                    }
                },
                Err(e) => {
                    result.exit_code = -1;
                    result.error = format!("failed to wait for process: {}", e);
                }
            },
            _ = scope.cancelled() => {
                // kill() also reaps the child, so nothing is left orphaned
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill cancelled process");
                }
                result.exit_code = -1;
                result.error = if scope.deadline_exceeded() {
                    TIMEOUT_ERROR.to_string()
                } else {
                    CANCELLED_ERROR.to_string()
                };
            }
        }

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        let mut output = String::from_utf8_lossy(&stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&stderr));

        result.output = output;
        result.duration_ms = elapsed_ms(started);
        result
    }
}

/// Read a pipe to EOF, returning whatever was captured.
async fn drain_pipe<R>(pipe: Option<R>) -> Vec<u8>
where
    R: AsyncRead + Unpin + Send,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
