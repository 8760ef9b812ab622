//! Lock-free event counting.
//!
//! The hot path increments the counter once per batch; the reporter reads
//! it periodically. Both counters are monotonic and use atomic adds, so
//! there are no lost updates under unbounded concurrent callers and no
//! locking on the hot path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Concurrent monotonic counters for processed events and reporter ticks.
///
/// Cloning yields another handle to the same underlying counters.
#[derive(Debug, Clone, Default)]
pub struct EventCounter {
    inner: Arc<CounterInner>,
}

#[derive(Debug, Default)]
struct CounterInner {
    /// Lifetime sum of batch sizes
    total_events: AtomicU64,
    /// Number of reporter invocations
    report_ticks: AtomicU64,
}

impl EventCounter {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` processed events.
    pub fn add(&self, n: u64) {
        self.inner.total_events.fetch_add(n, Ordering::Relaxed);
    }

    /// The lifetime total of processed events.
    pub fn total(&self) -> u64 {
        self.inner.total_events.load(Ordering::Relaxed)
    }

    /// Record one reporter tick and return its ordinal (1-based).
    pub fn record_tick(&self) -> u64 {
        self.inner.report_ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The number of reporter ticks recorded so far.
    pub fn ticks(&self) -> u64 {
        self.inner.report_ticks.load(Ordering::Relaxed)
    }
}
