//! The Global Clock: a single monotonically increasing counter shared by
//! all threads.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically increasing version counter.
///
/// Incremented once per committing writer transaction (§4.2 Commit step
/// 2) via [`GlobalClock::fetch_advance`]. Every atomic operation on this
/// counter is sequentially consistent, per §5's ordering guarantees;
/// weaker orderings would let two committing threads observe
/// inconsistent relative positions for `end_ts` versus each other's lock
/// releases.
#[derive(Debug, Default)]
pub struct GlobalClock(AtomicU64);

impl GlobalClock {
    /// Create a clock starting at 0.
    pub fn new() -> Self {
        GlobalClock(AtomicU64::new(0))
    }

    /// Snapshot the current value, for use as a transaction's `start_ts`.
    #[inline]
    pub fn load(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Atomically increment the clock and return the new value, for use
    /// as a committing transaction's `end_ts`.
    #[inline]
    pub fn fetch_advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Reset to 0. Only valid at process-level `init()`, before any
    /// thread has started a transaction.
    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }
}
