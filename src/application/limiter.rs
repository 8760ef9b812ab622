//! The blocking limiter and the atomically-swappable handle to it.
//!
//! A `Limiter` gates batches with `acquire(n)`, which delays the caller
//! until the configured sustained rate permits `n` more events. Limiters
//! are immutable once built: a rate change is expressed by constructing a
//! fresh limiter and publishing it through the `LimiterCell`, never by
//! mutating a limiter that concurrent callers may be blocked on.

use crate::application::ports::Clock;
use crate::domain::bucket::{BucketError, TokenBucket};
use crate::domain::rate::RateValue;
use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A rate limiter enforcing a sustained average throughput.
///
/// Reservations are taken under a short internal lock; the wait itself
/// happens outside it, so concurrent callers each claim consecutive slots
/// and sleep in parallel.
#[derive(Debug)]
pub struct Limiter {
    rate: f64,
    bucket: Mutex<TokenBucket>,
    clock: Arc<dyn Clock>,
}

impl Limiter {
    /// Create a limiter for the given threshold.
    ///
    /// # Errors
    /// Returns `BucketError::InvalidRate` if the value does not enable
    /// limiting (zero or negative) - callers are expected to tear the
    /// limiter down instead of building one for such values.
    pub fn new(rate: RateValue, clock: Arc<dyn Clock>) -> Result<Self, BucketError> {
        let bucket = TokenBucket::new(rate.get(), clock.now())?;
        Ok(Limiter {
            rate: rate.get(),
            bucket: Mutex::new(bucket),
            clock,
        })
    }

    /// The configured rate in events per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Reserve `permits` events and return the wait they must serve.
    ///
    /// This is the non-sleeping half of `acquire`, public so tests and
    /// callers that schedule their own waits can use it deterministically.
    pub fn reserve(&self, permits: u64) -> Duration {
        if permits == 0 {
            return Duration::ZERO;
        }
        let now = self.clock.now();
        self.bucket
            .lock()
            .expect("limiter mutex poisoned - a caller panicked during reservation")
            .reserve(permits, now)
    }

    /// Block the calling thread until `permits` more events may proceed
    /// under the configured rate.
    ///
    /// Never fails and never returns early; `permits = 0` returns
    /// immediately with no side effects. The wait is proportional to how
    /// far current throughput exceeds the configured rate and is bounded
    /// while the rate is positive.
    pub fn acquire(&self, permits: u64) {
        let wait = self.reserve(permits);
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }
}

/// The single-writer, multi-reader handle to the active limiter.
///
/// The controller replaces the contents atomically; hot-path readers get
/// the current limiter wait-free. A reader that obtained the outgoing
/// limiter just before a swap completes its `acquire` against the old
/// semantics - the two configurations are never mixed within one call.
///
/// # Example
/// ```
/// use pipeline_throttle::{Limiter, LimiterCell, RateValue, SystemClock};
/// use std::sync::Arc;
///
/// let cell = LimiterCell::new();
/// assert!(cell.current().is_none());
///
/// let rate: RateValue = "100".parse().unwrap();
/// let limiter = Limiter::new(rate, Arc::new(SystemClock::new())).unwrap();
/// cell.install(Arc::new(limiter));
/// assert!(cell.is_limiting());
///
/// cell.clear();
/// assert!(!cell.is_limiting());
/// ```
#[derive(Default)]
pub struct LimiterCell {
    current: ArcSwapOption<Limiter>,
}

impl LimiterCell {
    /// Create an empty cell (limiting disabled).
    pub fn new() -> Self {
        LimiterCell {
            current: ArcSwapOption::empty(),
        }
    }

    /// The active limiter, or `None` while limiting is disabled.
    pub fn current(&self) -> Option<Arc<Limiter>> {
        self.current.load_full()
    }

    /// Atomically publish a new limiter, replacing any previous one.
    pub fn install(&self, limiter: Arc<Limiter>) {
        self.current.store(Some(limiter));
    }

    /// Atomically disable limiting.
    pub fn clear(&self) {
        self.current.store(None);
    }

    /// Whether a limiter is currently installed.
    pub fn is_limiting(&self) -> bool {
        self.current.load().is_some()
    }
}

impl fmt::Debug for LimiterCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimiterCell")
            .field("rate", &self.current().map(|l| l.rate()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::MockClock;
    use std::time::Instant;

    fn rate(s: &str) -> RateValue {
        s.parse().unwrap()
    }

    #[test]
    fn test_limiter_rejects_non_positive_rates() {
        let clock = Arc::new(MockClock::new(Instant::now()));
        assert!(Limiter::new(rate("0"), clock.clone()).is_err());
        assert!(Limiter::new(rate("-2"), clock).is_err());
    }

    #[test]
    fn test_fresh_limiter_admits_a_burst_then_delays() {
        let clock = Arc::new(MockClock::new(Instant::now()));
        let limiter = Limiter::new(rate("5.0"), clock).unwrap();

        // One second of capacity is free; the overdraw waits 10/5 = 2s
        assert_eq!(limiter.reserve(5), Duration::ZERO);
        assert_eq!(limiter.reserve(10), Duration::from_secs(2));
    }

    #[test]
    fn test_reserve_zero_permits_is_free() {
        let clock = Arc::new(MockClock::new(Instant::now()));
        let limiter = Limiter::new(rate("5.0"), clock).unwrap();

        assert_eq!(limiter.reserve(0), Duration::ZERO);
        assert_eq!(limiter.reserve(5), Duration::ZERO);
    }

    #[test]
    fn test_waits_shrink_as_time_passes() {
        let start = Instant::now();
        let clock = Arc::new(MockClock::new(start));
        let limiter = Limiter::new(rate("10.0"), clock.clone()).unwrap();

        assert_eq!(limiter.reserve(10), Duration::ZERO);
        assert_eq!(limiter.reserve(10), Duration::from_secs(1));

        // After the debt window has elapsed the next batch is free again
        clock.advance(Duration::from_secs(2));
        assert_eq!(limiter.reserve(10), Duration::ZERO);
    }

    #[test]
    fn test_acquire_returns_immediately_under_capacity() {
        let clock = Arc::new(MockClock::new(Instant::now()));
        let limiter = Limiter::new(rate("1000"), clock).unwrap();

        // Within burst capacity acquire must not sleep
        let started = Instant::now();
        limiter.acquire(100);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_concurrent_reservations_claim_consecutive_slots() {
        use std::thread;

        let clock = Arc::new(MockClock::new(Instant::now()));
        let limiter = Arc::new(Limiter::new(rate("10.0"), clock).unwrap());

        let mut handles = vec![];
        for _ in 0..4 {
            let limiter = Arc::clone(&limiter);
            handles.push(thread::spawn(move || limiter.reserve(10)));
        }

        let mut waits: Vec<Duration> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        waits.sort();

        // 40 permits against 10 burst at 10/s: slots at 0s, 1s, 2s, 3s
        assert_eq!(waits[0], Duration::ZERO);
        assert_eq!(waits[1], Duration::from_secs(1));
        assert_eq!(waits[2], Duration::from_secs(2));
        assert_eq!(waits[3], Duration::from_secs(3));
    }

    #[test]
    fn test_cell_swap_preserves_reader_reference() {
        let clock = Arc::new(MockClock::new(Instant::now()));
        let cell = LimiterCell::new();

        let first = Arc::new(Limiter::new(rate("5.0"), clock.clone()).unwrap());
        cell.install(Arc::clone(&first));

        let seen = cell.current().unwrap();
        assert!(Arc::ptr_eq(&seen, &first));

        // A reader holding the old limiter keeps it across the swap
        let second = Arc::new(Limiter::new(rate("50.0"), clock).unwrap());
        cell.install(Arc::clone(&second));

        assert_eq!(seen.rate(), 5.0);
        assert!(Arc::ptr_eq(&cell.current().unwrap(), &second));
    }

    #[test]
    fn test_cell_clear_disables_limiting() {
        let clock = Arc::new(MockClock::new(Instant::now()));
        let cell = LimiterCell::new();
        cell.install(Arc::new(Limiter::new(rate("5.0"), clock).unwrap()));
        assert!(cell.is_limiting());

        cell.clear();
        assert!(!cell.is_limiting());
        assert!(cell.current().is_none());
    }
}
