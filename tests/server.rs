//! Protocol tests against a scripted executor.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use task_server::config::ServerConfig;
use task_server::executor::TaskExecutor;
use task_server::lifecycle::CancelScope;
use task_server::model::{TaskRequest, TaskResult};
use task_server::ratelimit::IpRateLimiter;

/// Executor double: waits a scripted delay under the request scope and echoes
/// a fixed payload, mirroring the real executor's cancellation policy.
struct ScriptedExecutor {
    delay: Duration,
    output: String,
}

impl ScriptedExecutor {
    fn new(delay: Duration, output: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            delay,
            output: output.into(),
        })
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn execute_task(&self, scope: &CancelScope, request: &TaskRequest) -> TaskResult {
        let mut result = TaskResult {
            command: request.command.clone(),
            executed_at: 1,
            duration_ms: self.delay.as_secs_f64() * 1000.0,
            exit_code: 0,
            output: String::new(),
            error: String::new(),
        };

        tokio::select! {
            _ = tokio::time::sleep(self.delay) => {
                result.output = self.output.clone();
            }
            _ = scope.cancelled() => {
                result.exit_code = -1;
                result.error = if scope.deadline_exceeded() {
                    "timeout exceeded".to_string()
                } else {
                    "task cancelled".to_string()
                };
            }
        }

        result
    }
}

#[tokio::test]
async fn test_valid_request_round_trip() {
    let addr = common::start_server(
        ScriptedExecutor::new(Duration::ZERO, "ok\n"),
        common::permissive_limiter(),
    )
    .await;

    let raw = common::round_trip(addr, r#"{"command":["echo","hi"]}"#).await;
    let result: TaskResult = serde_json::from_str(&raw).unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.output, "ok\n");
    assert_eq!(result.command, vec!["echo", "hi"]);
    assert!(result.error.is_empty());
}

#[tokio::test]
async fn test_response_has_no_trailing_newline() {
    let addr = common::start_server(
        ScriptedExecutor::new(Duration::ZERO, "x"),
        common::permissive_limiter(),
    )
    .await;

    let raw = common::round_trip(addr, r#"{"command":["x"]}"#).await;

    assert!(!raw.ends_with('\n'));
    assert!(serde_json::from_str::<TaskResult>(&raw).is_ok());
}

#[tokio::test]
async fn test_slow_executor_still_responds() {
    let addr = common::start_server(
        ScriptedExecutor::new(Duration::from_millis(300), "late"),
        common::permissive_limiter(),
    )
    .await;

    let raw = common::round_trip(addr, r#"{"command":["slow"]}"#).await;
    let result: TaskResult = serde_json::from_str(&raw).unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.output, "late");
}

#[tokio::test]
async fn test_sequential_requests_on_one_connection() {
    let addr = common::start_server(
        ScriptedExecutor::new(Duration::ZERO, "again"),
        common::permissive_limiter(),
    )
    .await;

    let mut stream = TcpStream::connect(addr).await.unwrap();

    for _ in 0..3 {
        stream.write_all(b"{\"command\":[\"x\"]}\n").await.unwrap();
        let raw = common::read_response(&mut stream).await;
        let result: TaskResult = serde_json::from_str(&raw).unwrap();
        assert_eq!(result.output, "again");
    }
}

#[tokio::test]
async fn test_request_timeout_leaves_connection_open() {
    let addr = common::start_server(
        ScriptedExecutor::new(Duration::from_millis(400), "done"),
        common::permissive_limiter(),
    )
    .await;

    let mut stream = TcpStream::connect(addr).await.unwrap();

    // First request times out after 50ms
    stream
        .write_all(b"{\"command\":[\"slow\"],\"timeout\":50}\n")
        .await
        .unwrap();
    let first: TaskResult =
        serde_json::from_str(&common::read_response(&mut stream).await).unwrap();
    assert_eq!(first.exit_code, -1);
    assert_eq!(first.error, "timeout exceeded");

    // The same connection still serves an unbounded follow-up
    stream.write_all(b"{\"command\":[\"slow\"]}\n").await.unwrap();
    let second: TaskResult =
        serde_json::from_str(&common::read_response(&mut stream).await).unwrap();
    assert_eq!(second.exit_code, 0);
    assert_eq!(second.output, "done");
}

#[tokio::test]
async fn test_malformed_request_gets_plain_text_error() {
    let addr = common::start_server(
        ScriptedExecutor::new(Duration::ZERO, "x"),
        common::permissive_limiter(),
    )
    .await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"this is not json\n").await.unwrap();

    let raw = common::read_response(&mut stream).await;
    assert!(raw.starts_with("Error parsing request"));
    assert!(serde_json::from_str::<serde_json::Value>(&raw).is_err());

    // The connection is closed after a parse error
    let n = stream.read(&mut [0u8; 8]).await.unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_oversized_request_is_rejected_as_malformed() {
    let addr = common::start_server(
        ScriptedExecutor::new(Duration::ZERO, "x"),
        common::permissive_limiter(),
    )
    .await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    // Well-formed JSON that overruns the 64 KiB frame cap before its newline
    let frame = format!(
        "{{\"command\":[\"noop\"],\"pad\":\"{}\"}}\n",
        "a".repeat(80 * 1024)
    );
    stream.write_all(frame.as_bytes()).await.unwrap();

    let raw = common::read_response(&mut stream).await;
    assert!(raw.starts_with("Error parsing request"));
    assert!(raw.contains("longer than"));

    // The stream cannot be resynchronized past the frame, so the connection
    // is torn down; unread client bytes may surface that as a reset
    let followup = stream.read(&mut [0u8; 8]).await;
    assert!(matches!(followup, Ok(0) | Err(_)));
}

#[tokio::test]
async fn test_partial_request_hits_decode_at_read_deadline() {
    let mut config = ServerConfig::default();
    config.timeouts.read_secs = 1;
    let addr = common::start_server_with_config(
        config,
        ScriptedExecutor::new(Duration::ZERO, "x"),
        common::permissive_limiter(),
    )
    .await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    // Half a request and no newline: the read deadline will deliver it to
    // the decoder, which answers with the parse-error text
    stream.write_all(b"{\"command\":").await.unwrap();

    let raw = common::read_response(&mut stream).await;
    assert!(raw.starts_with("Error parsing request"));
}

#[tokio::test]
async fn test_idle_connection_closes_quietly_at_read_deadline() {
    let mut config = ServerConfig::default();
    config.timeouts.read_secs = 1;
    let addr = common::start_server_with_config(
        config,
        ScriptedExecutor::new(Duration::ZERO, "x"),
        common::permissive_limiter(),
    )
    .await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let raw = common::read_response(&mut stream).await;

    assert!(raw.is_empty());
}

#[tokio::test]
async fn test_write_timeout_sends_best_effort_notice() {
    let mut config = ServerConfig::default();
    config.timeouts.write_secs = 1;
    config.timeouts.read_secs = 2;
    // A result far too large for the socket buffers to absorb
    let addr = common::start_server_with_config(
        config,
        ScriptedExecutor::new(Duration::ZERO, "x".repeat(64 * 1024 * 1024)),
        common::permissive_limiter(),
    )
    .await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"{\"command\":[\"big\"]}\n").await.unwrap();

    // Leave the response unread until the write deadline has fired
    tokio::time::sleep(Duration::from_millis(1_100)).await;

    let mut collected = Vec::new();
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        let n = match tokio::time::timeout(Duration::from_secs(10), stream.read(&mut chunk)).await {
            Ok(Ok(n)) => n,
            Ok(Err(_)) | Err(_) => break,
        };
        if n == 0 {
            break;
        }
        collected.extend_from_slice(&chunk[..n]);
    }

    // The abandoned payload is truncated and the plain-text notice trails it
    assert!(collected.len() < 64 * 1024 * 1024);
    let tail = String::from_utf8_lossy(&collected[collected.len().saturating_sub(4096)..]);
    assert!(tail.contains("Error writing response"));
}

#[tokio::test]
async fn test_rate_limited_connection_receives_nothing() {
    let limiter = Arc::new(IpRateLimiter::new(1, Duration::from_secs(60)).unwrap());
    let addr =
        common::start_server(ScriptedExecutor::new(Duration::ZERO, "ok"), limiter).await;

    // First connection consumes the single admission
    let first = common::round_trip(addr, r#"{"command":["one"]}"#).await;
    assert!(first.contains("\"exit_code\":0"));

    // Second connection is dropped with zero bytes on the wire
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let _ = stream.write_all(b"{\"command\":[\"two\"]}\n").await;
    let raw = common::read_response(&mut stream).await;

    assert!(raw.is_empty());
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_and_drains() {
    let (addr, server) = common::start_server_with_handle(
        ScriptedExecutor::new(Duration::from_secs(5), "never"),
        common::permissive_limiter(),
    )
    .await;

    // Park a request in the executor with no deadline of its own
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"{\"command\":[\"slow\"]}\n").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.active_connections(), 1);

    tokio::time::timeout(Duration::from_secs(2), server.shutdown())
        .await
        .expect("shutdown should drain promptly");
    assert_eq!(server.active_connections(), 0);

    // The parked request was cancelled, not timed out, and still answered
    let result: TaskResult =
        serde_json::from_str(&common::read_response(&mut stream).await).unwrap();
    assert_eq!(result.exit_code, -1);
    assert_eq!(result.error, "task cancelled");

    // Connections opened after shutdown are never served
    let mut late = TcpStream::connect(addr).await.unwrap();
    late.write_all(b"{\"command\":[\"late\"]}\n").await.unwrap();
    let unanswered =
        tokio::time::timeout(Duration::from_millis(300), late.read(&mut [0u8; 64])).await;
    assert!(!matches!(unanswered, Ok(Ok(n)) if n > 0));
}
