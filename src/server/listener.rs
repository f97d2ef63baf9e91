//! TCP accept loop and server lifecycle.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept connections and spawn one handler task per connection
//! - Run the periodic rate limiter sweep
//! - Cancel in-flight work and drain live connections on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::executor::TaskExecutor;
use crate::lifecycle::CancelScope;
use crate::ratelimit::RateLimiter;
use crate::server::connection::ConnectionTracker;
use crate::server::handler::ConnectionHandler;

/// Errors raised by the TCP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind the listen address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept a connection.
    #[error("failed to accept connection: {source}")]
    Accept { source: std::io::Error },
}

/// TCP server that executes one task request at a time per connection.
pub struct TcpTaskServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    executor: Arc<dyn TaskExecutor>,
    limiter: Arc<dyn RateLimiter>,
    tracker: ConnectionTracker,
    scope: CancelScope,
    read_timeout: Duration,
    write_timeout: Duration,
    sweep_interval: Duration,
}

impl TcpTaskServer {
    /// Bind to the configured address. Binding is the only fatal server error;
    /// everything after this point is handled per connection.
    pub async fn bind(
        config: &ServerConfig,
        executor: Arc<dyn TaskExecutor>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Result<Self, ServerError> {
        let bind_address = &config.listener.bind_address;
        let listener = TcpListener::bind(bind_address).await.map_err(|e| ServerError::Bind {
            addr: bind_address.clone(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| ServerError::Bind {
            addr: bind_address.clone(),
            source: e,
        })?;

        tracing::info!(address = %local_addr, "Listener bound");

        Ok(Self {
            listener,
            local_addr,
            executor,
            limiter,
            tracker: ConnectionTracker::new(),
            scope: CancelScope::new(),
            read_timeout: Duration::from_secs(config.timeouts.read_secs),
            write_timeout: Duration::from_secs(config.timeouts.write_secs),
            sweep_interval: Duration::from_secs(config.rate_limit.sweep_interval_secs),
        })
    }

    /// The address this server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Deadline applied to each socket read.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Deadline applied to each socket write.
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Number of connections currently being served.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Accept connections until shutdown or an accept failure.
    pub async fn run(&self) {
        self.spawn_sweep_task();

        loop {
            let accepted = tokio::select! {
                accepted = self.accept() => accepted,
                _ = self.scope.cancelled() => break,
            };

            match accepted {
                Ok((stream, peer)) => self.spawn_handler(stream, peer),
                Err(e) => {
                    if self.scope.is_cancelled() {
                        break;
                    }
                    tracing::error!(error = %e, "Accept failed, stopping server");
                    break;
                }
            }
        }

        tracing::info!("Accept loop stopped");
    }

    /// Stop accepting, cancel in-flight work, and wait for connections to drain.
    pub async fn shutdown(&self) {
        tracing::info!(
            active_connections = self.tracker.active_count(),
            "Server shutting down"
        );
        self.scope.cancel();
        self.tracker.wait_for_drain().await;
        tracing::info!("All connections drained");
    }

    async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServerError> {
        self.listener
            .accept()
            .await
            .map_err(|e| ServerError::Accept { source: e })
    }

    fn spawn_handler(&self, stream: TcpStream, peer: SocketAddr) {
        let handler = ConnectionHandler::new(
            Arc::clone(&self.executor),
            Arc::clone(&self.limiter),
            self.read_timeout,
            self.write_timeout,
        );
        let scope = self.scope.child();
        let guard = self.tracker.track();

        tokio::spawn(async move {
            handler.run(stream, peer, scope, guard).await;
        });
    }

    fn spawn_sweep_task(&self) {
        let limiter = Arc::clone(&self.limiter);
        let scope = self.scope.child();
        let sweep_interval = self.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            // The first tick of an interval completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        limiter.sweep();
                        tracing::debug!("Rate limiter sweep complete");
                    }
                    _ = scope.cancelled() => break,
                }
            }
        });
    }
}
