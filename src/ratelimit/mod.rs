//! Per-source admission control.
//!
//! # Data Flow
//! ```text
//! Connection accepted
//!     → handler asks allow(peer ip) once
//!     → admitted: request processing begins
//!     → rejected: connection closed with zero bytes written
//!
//! Background sweep task
//!     → sweep() drops entries whose window has aged out
//! ```
//!
//! # Design Decisions
//! - Fixed window per source: cheap, predictable, burst at the boundary is accepted
//! - One mutex around a plain map; the check runs once per connection, not per request
//! - A stale window resets lazily on the next allow(), sweep only bounds table growth

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Errors raised when constructing a rate limiter.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The per-window admission limit was zero.
    #[error("rate limit must admit at least one request per window")]
    ZeroLimit,

    /// The window length was zero.
    #[error("rate limit window must be longer than zero")]
    ZeroInterval,
}

/// Admission decisions for new connections, keyed by source identity.
pub trait RateLimiter: Send + Sync {
    /// Decide whether a connection from `source` is admitted.
    fn allow(&self, source: &str) -> bool;

    /// Drop tracking state for sources whose window has expired.
    fn sweep(&self);
}

/// Admission counter for one source within the current window.
struct RateEntry {
    count: u64,
    window_start: Instant,
}

/// Fixed-window rate limiter keyed by source IP.
pub struct IpRateLimiter {
    entries: Mutex<HashMap<String, RateEntry>>,
    limit: u64,
    interval: Duration,
}

impl IpRateLimiter {
    /// Create a limiter admitting `limit` connections per source per `interval`.
    pub fn new(limit: u64, interval: Duration) -> Result<Self, RateLimitError> {
        if limit == 0 {
            return Err(RateLimitError::ZeroLimit);
        }
        if interval.is_zero() {
            return Err(RateLimitError::ZeroInterval);
        }

        Ok(Self {
            entries: Mutex::new(HashMap::new()),
            limit,
            interval,
        })
    }

    /// The configured window length.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of sources currently tracked.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("rate limiter mutex poisoned").len()
    }

    /// Whether no sources are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RateLimiter for IpRateLimiter {
    fn allow(&self, source: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("rate limiter mutex poisoned");

        match entries.get_mut(source) {
            None => {
                entries.insert(
                    source.to_string(),
                    RateEntry {
                        count: 1,
                        window_start: now,
                    },
                );
                true
            }
            Some(entry) => {
                if now.duration_since(entry.window_start) > self.interval {
                    // Stale window: reset and admit
                    entry.count = 1;
                    entry.window_start = now;
                    true
                } else if entry.count >= self.limit {
                    false
                } else {
                    entry.count += 1;
                    true
                }
            }
        }
    }

    fn sweep(&self) {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("rate limiter mutex poisoned");
        entries.retain(|_, entry| now.duration_since(entry.window_start) <= self.interval);
    }
}
