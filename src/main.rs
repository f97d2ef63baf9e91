//! Task execution daemon.
//!
//! A TCP service that runs client-submitted commands under deadlines, built
//! with Tokio.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌────────────────────────────────────────────────┐
//!                      │                  TASK SERVER                   │
//!                      │                                                │
//!   Client (JSON/TCP)  │  ┌──────────┐   ┌───────────┐   ┌──────────┐  │
//!   ───────────────────┼─▶│ listener │──▶│  handler  │──▶│ executor │──┼──▶ child process
//!                      │  └──────────┘   └─────┬─────┘   └────┬─────┘  │
//!                      │                       │              │        │
//!   Result (JSON) ◀────┼───────────────────────┘   scope ─────┘        │
//!                      │                          (timeout/shutdown)   │
//!                      │                                                │
//!                      │  ┌──────────────────────────────────────────┐  │
//!                      │  │          Cross-Cutting Concerns          │  │
//!                      │  │  ┌────────┐ ┌───────────┐ ┌───────────┐  │  │
//!                      │  │  │ config │ │ ratelimit │ │observabil-│  │  │
//!                      │  │  │        │ │ + sweep   │ │ity        │  │  │
//!                      │  │  └────────┘ └───────────┘ └───────────┘  │  │
//!                      │  └──────────────────────────────────────────┘  │
//!                      └────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use task_server::config::loader::load_config;
use task_server::config::ServerConfig;
use task_server::executor::CommandExecutor;
use task_server::lifecycle::signals::shutdown_signal;
use task_server::observability::{logging, metrics};
use task_server::ratelimit::IpRateLimiter;
use task_server::server::TcpTaskServer;

#[derive(Parser)]
#[command(name = "task-server")]
#[command(about = "TCP service that runs client-submitted commands", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => load_config(&path)?,
        None => ServerConfig::default(),
    };

    logging::init_logging(&config.observability);

    tracing::info!("task-server v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit = config.rate_limit.limit,
        rate_interval_secs = config.rate_limit.interval_secs,
        read_timeout_secs = config.timeouts.read_secs,
        write_timeout_secs = config.timeouts.write_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let limiter = Arc::new(IpRateLimiter::new(
        config.rate_limit.limit,
        Duration::from_secs(config.rate_limit.interval_secs),
    )?);
    let executor = Arc::new(CommandExecutor::new());

    let server = Arc::new(TcpTaskServer::bind(&config, executor, limiter).await?);
    tracing::info!(address = %server.local_addr(), "Listening for connections");

    let accept = Arc::clone(&server);
    let accept_loop = tokio::spawn(async move { accept.run().await });

    shutdown_signal().await;
    server.shutdown().await;
    let _ = accept_loop.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
