//! Millisecond tick service
//!
//! The engine never reads wall time directly; every wait and timeout goes
//! through a [`Clock`] so tests can drive time by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic millisecond clock
pub trait Clock: Send {
    /// Current tick in milliseconds
    fn now_ms(&self) -> u64;

    /// Block for `ms` milliseconds
    fn wait_ms(&self, ms: u64);

    /// Milliseconds elapsed since `start`
    fn elapsed_since(&self, start: u64) -> u64 {
        self.now_ms().wrapping_sub(start)
    }
}

/// Clock backed by `std::time::Instant`
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose tick zero is now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn wait_ms(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/// Hand-driven clock for tests
///
/// Every read advances time by `step_ms`, so spin loops that poll the clock
/// always reach their deadline. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
    step_ms: u64,
}

impl ManualClock {
    /// Create a clock at tick zero advancing `step_ms` per read
    pub fn new(step_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(0)),
            step_ms,
        }
    }

    /// Move time forward without reading it
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Current tick without advancing
    pub fn peek(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.fetch_add(self.step_ms, Ordering::SeqCst)
    }

    fn wait_ms(&self, ms: u64) {
        self.advance(ms);
    }
}
