//! TCP serving subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, one task per connection)
//!     → connection.rs (identity, drain tracking)
//!     → handler.rs (admit → read → decode → execute → write, repeat)
//!     → executor (scoped command execution)
//!
//! Shutdown:
//!     cancel root scope → accept loop stops → handlers wind down
//!     → tracker drains → shutdown() returns
//! ```
//!
//! # Design Decisions
//! - Requests on a connection are strictly sequential; connections are independent
//! - The rate limiter is consulted once per connection, not per request
//! - Responses carry no trailing newline; parse failures are answered in plain text

pub mod connection;
pub mod handler;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use handler::ConnectionHandler;
pub use listener::{ServerError, TcpTaskServer};
