//! Network service that executes client-submitted commands under deadlines.

pub mod config;
pub mod executor;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod ratelimit;
pub mod server;

pub use config::schema::ServerConfig;
pub use executor::{CommandExecutor, TaskExecutor};
pub use model::{TaskRequest, TaskResult};
pub use ratelimit::{IpRateLimiter, RateLimiter};
pub use server::TcpTaskServer;
