//! Per-connection protocol handling.
//!
//! # Responsibilities
//! - Admit or silently drop the connection (one rate check per connection)
//! - Frame requests: one newline-terminated JSON object per request, capped
//!   at 64 KiB
//! - Enforce read/write deadlines on the socket
//! - Derive a per-request cancel scope from the caller's timeout
//! - Write results without a trailing newline; parse errors as plain text
//!
//! A request deadline only bounds that request; the connection keeps serving.
//! Read deadline violations and peer disconnects end the connection. Write
//! failures are logged; a dead transport fails the next read.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::executor::{TaskExecutor, TIMEOUT_ERROR};
use crate::lifecycle::CancelScope;
use crate::model::{TaskRequest, TaskResult};
use crate::observability::metrics;
use crate::ratelimit::RateLimiter;
use crate::server::connection::ConnectionGuard;

/// Largest accepted request frame. A line that exceeds this before its
/// terminator is rejected as malformed and closes the connection, since the
/// stream cannot be resynchronized past it.
const MAX_FRAME_BYTES: u64 = 64 * 1024;

/// Handles one client connection from admission to close.
pub struct ConnectionHandler {
    executor: Arc<dyn TaskExecutor>,
    limiter: Arc<dyn RateLimiter>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl ConnectionHandler {
    /// Create a handler sharing the server's executor and limiter.
    pub fn new(
        executor: Arc<dyn TaskExecutor>,
        limiter: Arc<dyn RateLimiter>,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            limiter,
            read_timeout,
            write_timeout,
        }
    }

    /// Serve the connection until the peer disconnects, a deadline is
    /// violated, or the scope is cancelled. The guard is dropped exactly once
    /// on every exit path.
    pub async fn run(
        self,
        stream: TcpStream,
        peer: SocketAddr,
        scope: CancelScope,
        guard: ConnectionGuard,
    ) {
        let id = guard.id();

        // 1. Admission: one rate check per connection, keyed by peer IP alone
        let source = peer.ip().to_string();
        if !self.limiter.allow(&source) {
            // Rejected peers get zero bytes, not an error response
            tracing::warn!(connection_id = %id, peer = %source, "Rate limit exceeded, dropping connection");
            metrics::record_rate_limited();
            return;
        }

        tracing::debug!(connection_id = %id, peer = %peer, "Connection admitted");

        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut writer = write_half;
        let mut line: Vec<u8> = Vec::new();

        loop {
            line.clear();

            // 2. Read one newline-terminated request under the read deadline.
            // The cap keeps an oversized line from accumulating unboundedly.
            let mut limited = (&mut reader).take(MAX_FRAME_BYTES + 1);
            let read_outcome = tokio::select! {
                outcome = timeout(self.read_timeout, limited.read_until(b'\n', &mut line)) => outcome,
                _ = scope.cancelled() => break,
            };

            // A deadline hit with partial bytes still goes through decode so
            // the peer hears a parse error; either way it ends the connection.
            let mut terminal_read = false;
            match read_outcome {
                Ok(Ok(0)) => break,
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::debug!(connection_id = %id, error = %e, "Read failed");
                    break;
                }
                Err(_) => {
                    if line.is_empty() {
                        tracing::debug!(connection_id = %id, "Idle past read deadline");
                        break;
                    }
                    terminal_read = true;
                }
            }

            if line.len() as u64 > MAX_FRAME_BYTES {
                tracing::warn!(connection_id = %id, bytes = line.len(), "Request frame too long");
                metrics::record_parse_error();
                let message = format!(
                    "Error parsing request: request frame longer than {} bytes",
                    MAX_FRAME_BYTES
                );
                let _ = timeout(self.write_timeout, writer.write_all(message.as_bytes())).await;
                break;
            }

            // 3. Decode; malformed input earns a plain-text (non-JSON) error
            let request: TaskRequest = match serde_json::from_slice(&line) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(connection_id = %id, error = %e, "Failed to parse request");
                    metrics::record_parse_error();
                    let message = format!("Error parsing request: {}", e);
                    let _ = timeout(self.write_timeout, writer.write_all(message.as_bytes())).await;
                    break;
                }
            };

            // 4. A caller timeout narrows the scope for this request only
            let request_scope = if request.timeout > 0 {
                scope.child_with_timeout(Duration::from_millis(request.timeout))
            } else {
                scope.child()
            };

            // 5. Execute; failures come back encoded in the result
            let result = self.executor.execute_task(&request_scope, &request).await;
            metrics::record_task(outcome_label(&result), result.duration_ms / 1000.0);

            // 6. Write the result with no trailing newline; receivers detect
            // the JSON boundary themselves
            match serde_json::to_vec(&result) {
                Ok(payload) => match timeout(self.write_timeout, writer.write_all(&payload)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::error!(connection_id = %id, error = %e, "Failed to write response");
                        let message = format!("Error writing response: {}", e);
                        let _ = timeout(self.write_timeout, writer.write_all(message.as_bytes())).await;
                    }
                    Err(_) => {
                        tracing::error!(connection_id = %id, "Response write timed out");
                        let message = "Error writing response: write timed out";
                        let _ = timeout(self.write_timeout, writer.write_all(message.as_bytes())).await;
                    }
                },
                Err(e) => {
                    tracing::error!(connection_id = %id, error = %e, "Failed to encode result");
                    let message = format!("Error encoding response: {}", e);
                    let _ = timeout(self.write_timeout, writer.write_all(message.as_bytes())).await;
                }
            }

            if terminal_read {
                break;
            }
        }

        tracing::debug!(connection_id = %id, "Connection closed");
    }
}

fn outcome_label(result: &TaskResult) -> &'static str {
    if result.error.is_empty() {
        "ok"
    } else if result.error == TIMEOUT_ERROR {
        "timeout"
    } else {
        "error"
    }
}
