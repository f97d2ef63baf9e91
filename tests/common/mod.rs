//! Shared utilities for the protocol and end-to-end tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use task_server::config::ServerConfig;
use task_server::executor::TaskExecutor;
use task_server::ratelimit::{IpRateLimiter, RateLimiter};
use task_server::server::TcpTaskServer;

/// Spawn a server on an ephemeral port with the given collaborators.
pub async fn start_server(
    executor: Arc<dyn TaskExecutor>,
    limiter: Arc<dyn RateLimiter>,
) -> SocketAddr {
    start_server_with_config(ServerConfig::default(), executor, limiter).await
}

/// Spawn a server with explicit config. The bind address is always forced
/// onto an ephemeral port.
#[allow(dead_code)]
pub async fn start_server_with_config(
    mut config: ServerConfig,
    executor: Arc<dyn TaskExecutor>,
    limiter: Arc<dyn RateLimiter>,
) -> SocketAddr {
    config.listener.bind_address = "127.0.0.1:0".to_string();
    let server = Arc::new(
        TcpTaskServer::bind(&config, executor, limiter)
            .await
            .unwrap(),
    );
    let addr = server.local_addr();

    tokio::spawn(async move { server.run().await });

    addr
}

/// Spawn a server and keep its handle so a test can drive `shutdown()`.
#[allow(dead_code)]
pub async fn start_server_with_handle(
    executor: Arc<dyn TaskExecutor>,
    limiter: Arc<dyn RateLimiter>,
) -> (SocketAddr, Arc<TcpTaskServer>) {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    let server = Arc::new(
        TcpTaskServer::bind(&config, executor, limiter)
            .await
            .unwrap(),
    );
    let addr = server.local_addr();

    let accept = Arc::clone(&server);
    tokio::spawn(async move { accept.run().await });

    (addr, server)
}

/// A limiter that effectively never rejects.
pub fn permissive_limiter() -> Arc<dyn RateLimiter> {
    Arc::new(IpRateLimiter::new(10_000, Duration::from_secs(60)).unwrap())
}

/// Send one newline-terminated request and return the raw response.
pub async fn round_trip(addr: SocketAddr, body: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(body.as_bytes()).await.unwrap();
    stream.write_all(b"\n").await.unwrap();
    read_response(&mut stream).await
}

/// Read one response with JSON-boundary detection (responses carry no
/// trailing newline). Plain-text errors come back once the peer closes.
pub async fn read_response(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = match tokio::time::timeout(Duration::from_secs(10), stream.read(&mut chunk)).await {
            Ok(Ok(n)) => n,
            Ok(Err(_)) | Err(_) => break,
        };
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if serde_json::from_slice::<serde_json::Value>(&buf).is_ok() {
            break;
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}
