//! Wire types shared between the server, the executor and clients.
//!
//! # Data Flow
//! ```text
//! Client request (one JSON object per line)
//!     → TaskRequest (command argv + optional timeout)
//!     → executor runs the command
//!     → TaskResult (exit code, combined output, timing)
//!     → encoded back to the client without a trailing newline
//! ```
//!
//! # Design Decisions
//! - Both types are plain data; they never change after decode/build
//! - Empty `output`/`error` are omitted on the wire, absent fields decode to ""
//! - `timeout` of 0 (or absent) means the task runs unbounded

use serde::{Deserialize, Serialize};

fn is_zero(value: &u64) -> bool {
    *value == 0
}

/// A single command execution request.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TaskRequest {
    /// Command argv; the first element is the program to run.
    pub command: Vec<String>,

    /// Execution timeout in milliseconds. 0 means unbounded.
    #[serde(skip_serializing_if = "is_zero")]
    pub timeout: u64,
}

/// The outcome of one command execution.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TaskResult {
    /// The argv that was requested, echoed back.
    pub command: Vec<String>,

    /// Unix timestamp (seconds) at which execution started.
    pub executed_at: i64,

    /// Wall-clock duration of the execution in milliseconds.
    pub duration_ms: f64,

    /// Process exit code. -1 when no real code exists (timeout, spawn
    /// failure, signal termination, empty command).
    pub exit_code: i32,

    /// Combined stdout and stderr, captured best-effort.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,

    /// Failure description; empty on success.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
}
