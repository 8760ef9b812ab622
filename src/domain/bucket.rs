//! Token bucket for enforcing a sustained average rate.
//!
//! The bucket refills continuously at the configured rate and is debited
//! when events are admitted. The balance may go negative: a caller that
//! overdraws is told how long to wait for the debt to be repaid, so large
//! batches are delayed rather than rejected. Burst capacity is capped at
//! one second of accumulated tokens, so idle periods can never bank more
//! than one second's worth of events.

use std::fmt;
use std::time::{Duration, Instant};

/// Accumulated capacity is bounded by this window times the rate.
const BURST_WINDOW_SECS: f64 = 1.0;

/// Error returned when a bucket is configured with an unusable rate.
#[derive(Debug, Clone, PartialEq)]
pub enum BucketError {
    /// The rate must be a positive, finite number of tokens per second
    InvalidRate(f64),
}

impl fmt::Display for BucketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketError::InvalidRate(rate) => {
                write!(f, "token bucket rate must be positive and finite, got {}", rate)
            }
        }
    }
}

impl std::error::Error for BucketError {}

/// A token bucket with debt-based reservations.
///
/// Time is supplied by the caller, so the bucket itself is deterministic.
///
/// # Example
/// ```
/// use pipeline_throttle::TokenBucket;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let mut bucket = TokenBucket::new(5.0, start).unwrap();
///
/// // A fresh bucket holds one second of capacity (5 tokens).
/// assert_eq!(bucket.reserve(5, start), Duration::ZERO);
///
/// // The next 10 events overdraw by 10 tokens: wait 2 seconds.
/// assert_eq!(bucket.reserve(10, start), Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Refill rate in tokens per second
    rate: f64,
    /// Maximum token balance
    burst: f64,
    /// Current balance; negative means debt
    tokens: f64,
    /// Last refill timestamp
    last: Instant,
}

impl TokenBucket {
    /// Create a bucket refilling at `rate` tokens per second, starting full.
    ///
    /// # Errors
    /// Returns `BucketError::InvalidRate` unless `rate` is positive and
    /// finite.
    pub fn new(rate: f64, now: Instant) -> Result<Self, BucketError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(BucketError::InvalidRate(rate));
        }
        let burst = (rate * BURST_WINDOW_SECS).max(1.0);
        Ok(TokenBucket {
            rate,
            burst,
            tokens: burst,
            last: now,
        })
    }

    /// The configured refill rate in tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// The maximum token balance.
    pub fn burst(&self) -> f64 {
        self.burst
    }

    /// Debit `n` tokens and return how long the caller must wait before
    /// the admitted events may proceed.
    ///
    /// `n = 0` returns immediately without touching the balance. The
    /// reservation always succeeds; an overdraw is expressed as a positive
    /// wait, never an error.
    pub fn reserve(&mut self, n: u64, now: Instant) -> Duration {
        if n == 0 {
            return Duration::ZERO;
        }

        self.refill(now);
        self.tokens -= n as f64;

        if self.tokens < 0.0 {
            Duration::from_secs_f64(-self.tokens / self.rate)
        } else {
            Duration::ZERO
        }
    }

    /// The balance the bucket would hold at `at`, without reserving.
    pub fn available_at(&self, at: Instant) -> f64 {
        let elapsed = at.saturating_duration_since(self.last);
        (self.tokens + elapsed.as_secs_f64() * self.rate).min(self.burst)
    }

    fn refill(&mut self, now: Instant) {
        self.tokens = self.available_at(now);
        if now > self.last {
            self.last = now;
        }
    }
}
