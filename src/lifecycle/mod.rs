//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Build limiter/executor → Bind listener → Serve
//!
//! Shutdown (signals.rs):
//!     SIGTERM/SIGINT → cancel root scope → stop accepting
//!     → in-flight executions cancelled through their scope chain
//!     → drain tracked connections → Exit
//!
//! Cancellation (cancel.rs):
//!     root scope → per-connection child → per-request child (+ deadline)
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, cancel work, drain, close
//! - One cancellation mechanism for shutdown and request timeouts
//! - A request-scoped deadline is dropped with the request, never accumulated

pub mod cancel;
pub mod signals;

pub use cancel::CancelScope;
