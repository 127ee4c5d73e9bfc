//! Lamport logical clocks for causal ordering.
//!
//! Used to order events inside the trace accumulator and rule lifecycle
//! independently of wall-clock timestamps, which can skew or go backwards
//! across threads. See Lamport (1978), "Time, Clocks, and the Ordering of
//! Events in a Distributed System".

use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe Lamport logical clock backed by a single atomic counter.
#[derive(Debug)]
pub struct LamportClock {
    counter: AtomicU64,
}

impl LamportClock {
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    pub const fn with_value(initial_value: u64) -> Self {
        Self {
            counter: AtomicU64::new(initial_value),
        }
    }

    /// Record a local event: increment and return the new logical timestamp.
    pub fn tick(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Apply Lamport's rule on receipt of a remote timestamp:
    /// `local = max(local, remote) + 1`.
    pub fn sync(&self, remote_clock: u64) {
        self.counter.fetch_max(remote_clock, Ordering::SeqCst);
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Read the current timestamp without advancing it.
    pub fn now(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn reset(&self) {
        self.counter.store(0, Ordering::SeqCst);
    }
}

impl Default for LamportClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide clock used to order trace-accumulator activity and
/// lifecycle-FSM generation counters.
pub static GLOBAL_CLOCK: LamportClock = LamportClock::new();
