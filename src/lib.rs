//! # pipeline-throttle
//!
//! Dynamic rate limiting and event counting for batch pipelines.
//!
//! This crate throttles a continuous stream of event batches to a target
//! rate that an operator can change **at runtime**, without restarting the
//! consumer, and maintains an accurate, low-overhead count of processed
//! events that is periodically logged and persisted for external
//! monitoring.
//!
//! ## How it works
//!
//! - A background **poller** re-reads a rate threshold from an external
//!   text channel (by default, the first line of a file) on a fixed
//!   schedule. When the value changes, it builds a fresh token-bucket
//!   limiter and publishes it with a single atomic reference swap; a value
//!   `<= 0` (or a missing channel) disables limiting. Read and parse
//!   failures are logged and leave the current configuration untouched.
//! - The **hot path** ([`ThrottleFilter::process`]) is invoked once per
//!   batch by the host pipeline, from any number of worker threads. It
//!   blocks on the active limiter when throughput exceeds the configured
//!   rate, forwards every event to the downstream listener in order, and
//!   counts the batch with a lock-free accumulator.
//! - A background **reporter** logs the running total on a configurable
//!   cadence and overwrites the count channel every tick, best-effort.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pipeline_throttle::ThrottleFilter;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let filter = ThrottleFilter::builder()
//!     .with_rate_path("/etc/pipeline/rate")    // first line: events/second
//!     .with_count_path("/var/run/pipeline/count")
//!     .with_count_log_delay(30)                // log the count every 30 ticks
//!     .build()?;
//!
//! // Spawn the poller and reporter on the current tokio runtime.
//! filter.start();
//!
//! // Host worker threads call this once per batch.
//! let batch = filter.process(vec!["event-1", "event-2"], &|_event: &&str| {
//!     // downstream per-event hook
//! });
//! assert_eq!(batch.len(), 2);
//!
//! // Orderly shutdown: stops the background tasks and emits one final
//! // count report.
//! filter.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Changing the rate at runtime
//!
//! The rate channel is plain text; operators steer the pipeline with a
//! shell one-liner:
//!
//! ```text
//! echo 500 > /etc/pipeline/rate    # throttle to 500 events/second
//! echo 0   > /etc/pipeline/rate    # disable limiting
//! ```
//!
//! The poller picks the change up on its next cycle (default: one
//! second). Limiters are replaced, never mutated: a batch already waiting
//! on the old limiter completes under the old rate, and the next batch
//! observes the new one. A stable value never reallocates the limiter.
//!
//! ## Burst behavior
//!
//! The token bucket banks at most **one second** of unused capacity, so a
//! quiet period permits a short burst but idle time can never defeat the
//! limit. Large batches are admitted by going into debt and delaying,
//! never rejected - `process` has no failure mode on the hot path.
//!
//! ## Failure policy
//!
//! Rate-source and count-sink failures are logged and recovered; they
//! never interrupt, drop, or fail the event stream. The worst case is
//! that limiting or persistence degrades to a no-op while the failure is
//! being logged.
//!
//! ## Deterministic testing
//!
//! The periodic task bodies are plain methods ([`RateController::poll`],
//! [`CountReporter::tick`]), and all time flows through the [`Clock`]
//! port, so tests can drive the subsystem tick by tick with the mock
//! clock and channels in `infrastructure::mocks` (enabled with the
//! `test-helpers` feature).

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    bucket::{BucketError, TokenBucket},
    rate::{ParseRateError, RateValue},
};

pub use application::{
    controller::{RateController, RateGauge},
    counter::EventCounter,
    limiter::{Limiter, LimiterCell},
    ports::{Clock, CountSink, CountWriteError, RateReadError, RateSource},
    reporter::{CountReporter, ReporterConfig, ReporterConfigError},
};

#[cfg(feature = "async")]
pub use application::{
    controller::PollerHandle,
    reporter::{ReporterHandle, ShutdownError},
};

pub use infrastructure::{
    clock::SystemClock,
    file::{FileCountSink, FileRateSource},
    filter::{BuildError, MatchListener, ThrottleFilter, ThrottleFilterBuilder},
};
