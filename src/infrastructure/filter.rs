//! The hot-path filter invoked by the host pipeline.
//!
//! `ThrottleFilter::process` is called once per batch from any number of
//! host worker threads. It gates the batch on the currently installed
//! limiter, forwards every event to the downstream listener in input
//! order, counts the batch, and returns it unmodified. The only blocking
//! point is the limiter wait; the filter itself performs no I/O.

use crate::application::controller::RateGauge;
use crate::application::counter::EventCounter;
use crate::application::limiter::LimiterCell;
use crate::application::ports::{Clock, CountSink, RateSource};
use crate::application::reporter::{ReporterConfig, ReporterConfigError};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::file::{FileCountSink, FileRateSource};
use std::path::PathBuf;
use std::sync::Arc;
#[cfg(feature = "async")]
use std::sync::Mutex;
use std::time::Duration;

#[cfg(feature = "async")]
use crate::application::controller::{PollerHandle, RateController};
#[cfg(feature = "async")]
use crate::application::reporter::{CountReporter, ReporterHandle, ShutdownError};

/// Downstream collaborator notified once per forwarded event.
///
/// Implemented for closures, so tests and simple hosts can pass
/// `&|event: &E| { ... }` directly.
pub trait MatchListener<E>: Send + Sync {
    /// Called for each event the filter forwards, in batch order.
    fn matched(&self, event: &E);
}

impl<E, F> MatchListener<E> for F
where
    F: Fn(&E) + Send + Sync,
{
    fn matched(&self, event: &E) {
        self(event)
    }
}

/// Error returned when building a ThrottleFilter fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Poll interval duration must be greater than zero
    ZeroPollInterval,
    /// Reporter configuration validation failed
    Reporter(ReporterConfigError),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::ZeroPollInterval => {
                write!(f, "poll interval must be greater than 0")
            }
            BuildError::Reporter(e) => {
                write!(f, "reporter configuration error: {}", e)
            }
        }
    }
}

impl std::error::Error for BuildError {}

impl From<ReporterConfigError> for BuildError {
    fn from(e: ReporterConfigError) -> Self {
        BuildError::Reporter(e)
    }
}

/// Builder for constructing a `ThrottleFilter`.
pub struct ThrottleFilterBuilder {
    rate_source: Option<Arc<dyn RateSource>>,
    count_sink: Option<Arc<dyn CountSink>>,
    poll_interval: Duration,
    report_interval: Duration,
    count_log_delay: i64,
    clock: Option<Arc<dyn Clock>>,
}

impl ThrottleFilterBuilder {
    /// Read the rate threshold from the first line of a text file.
    ///
    /// Without a rate source the filter never limits.
    pub fn with_rate_path(self, path: impl Into<PathBuf>) -> Self {
        self.with_rate_source(Arc::new(FileRateSource::new(path)))
    }

    /// Read the rate threshold from a custom source.
    pub fn with_rate_source(mut self, source: Arc<dyn RateSource>) -> Self {
        self.rate_source = Some(source);
        self
    }

    /// Persist the event count to a text file on every reporter tick.
    ///
    /// Without a count sink the count is only logged.
    pub fn with_count_path(self, path: impl Into<PathBuf>) -> Self {
        self.with_count_sink(Arc::new(FileCountSink::new(path)))
    }

    /// Persist the event count to a custom sink.
    pub fn with_count_sink(mut self, sink: Arc<dyn CountSink>) -> Self {
        self.count_sink = Some(sink);
        self
    }

    /// Set how often the rate source is re-read.
    ///
    /// Default: 1 second. Validated at `build()` time.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how often the reporter ticks.
    ///
    /// Default: 1 second. Validated at `build()` time.
    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Set the number of reporter ticks between count log lines.
    ///
    /// Default: 30. Values `<= 0` disable periodic count logging; count
    /// persistence is unaffected.
    pub fn with_count_log_delay(mut self, ticks: i64) -> Self {
        self.count_log_delay = ticks;
        self
    }

    /// Set a custom clock (mainly for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the filter.
    ///
    /// Background tasks are not started here; call
    /// [`ThrottleFilter::start`] once a tokio runtime is available.
    ///
    /// # Errors
    /// Returns `BuildError` if an interval is zero.
    pub fn build(self) -> Result<ThrottleFilter, BuildError> {
        if self.poll_interval.is_zero() {
            return Err(BuildError::ZeroPollInterval);
        }
        let reporter_config =
            ReporterConfig::new(self.report_interval)?.with_log_delay(self.count_log_delay);

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));

        tracing::info!(
            limiting = self.rate_source.is_some(),
            persistence = self.count_sink.is_some(),
            "throttle filter configured"
        );

        Ok(ThrottleFilter {
            limiter: Arc::new(LimiterCell::new()),
            counter: EventCounter::new(),
            gauge: Arc::new(RateGauge::new()),
            rate_source: self.rate_source,
            count_sink: self.count_sink,
            poll_interval: self.poll_interval,
            reporter_config,
            clock,
            #[cfg(feature = "async")]
            tasks: Arc::new(Mutex::new(None)),
        })
    }
}

#[cfg(feature = "async")]
#[derive(Debug)]
struct BackgroundTasks {
    poller: Option<PollerHandle>,
    reporter: ReporterHandle,
}

/// Rate limiting and counting for a stream of event batches.
///
/// Cheap to clone; clones share the limiter, the counter and the
/// background tasks. Safe to invoke concurrently from any number of host
/// worker threads.
///
/// # Example
/// ```
/// use pipeline_throttle::ThrottleFilter;
///
/// let filter = ThrottleFilter::builder().build().unwrap();
///
/// // No rate source configured: batches pass through unthrottled.
/// let batch = filter.process(vec!["a", "b", "c"], &|_event: &&str| {});
/// assert_eq!(batch.len(), 3);
/// assert_eq!(filter.total_events(), 3);
/// ```
#[derive(Clone)]
pub struct ThrottleFilter {
    limiter: Arc<LimiterCell>,
    counter: EventCounter,
    gauge: Arc<RateGauge>,
    rate_source: Option<Arc<dyn RateSource>>,
    count_sink: Option<Arc<dyn CountSink>>,
    poll_interval: Duration,
    reporter_config: ReporterConfig,
    clock: Arc<dyn Clock>,
    #[cfg(feature = "async")]
    tasks: Arc<Mutex<Option<BackgroundTasks>>>,
}

impl ThrottleFilter {
    /// Create a builder for configuring the filter.
    ///
    /// Defaults:
    /// - No rate source (limiting disabled)
    /// - No count sink (persistence disabled)
    /// - Poll interval: 1 second
    /// - Report interval: 1 second
    /// - Count log delay: 30 ticks
    pub fn builder() -> ThrottleFilterBuilder {
        ThrottleFilterBuilder {
            rate_source: None,
            count_sink: None,
            poll_interval: Duration::from_secs(1),
            report_interval: Duration::from_secs(1),
            count_log_delay: 30,
            clock: None,
        }
    }

    /// Process one batch of events.
    ///
    /// Empty batches return immediately with no side effects. Otherwise
    /// the call may block on the active limiter for a duration
    /// proportional to how far current throughput exceeds the configured
    /// rate, forwards every event to `listener` in input order, adds the
    /// batch size to the counter, and returns the batch unmodified.
    pub fn process<E, L>(&self, batch: Vec<E>, listener: &L) -> Vec<E>
    where
        L: MatchListener<E> + ?Sized,
    {
        if batch.is_empty() {
            return batch;
        }

        let size = batch.len() as u64;
        if let Some(limiter) = self.limiter.current() {
            limiter.acquire(size);
        }

        for event in &batch {
            listener.matched(event);
        }

        self.counter.add(size);
        batch
    }

    /// The lifetime total of processed events.
    pub fn total_events(&self) -> u64 {
        self.counter.total()
    }

    /// The rate of the currently installed limiter, if limiting is active.
    pub fn current_rate(&self) -> Option<f64> {
        self.limiter.current().map(|limiter| limiter.rate())
    }

    /// Whether a limiter is currently installed.
    pub fn is_limiting(&self) -> bool {
        self.limiter.is_limiting()
    }

    /// Whether a rate source was configured.
    pub fn limiting_configured(&self) -> bool {
        self.rate_source.is_some()
    }

    /// Whether a count sink was configured.
    pub fn persistence_configured(&self) -> bool {
        self.count_sink.is_some()
    }

    /// The limiter cell shared with the rate controller.
    ///
    /// Exposed so the controller can be driven manually in deterministic
    /// tests or from a custom scheduler.
    pub fn limiter_cell(&self) -> &Arc<LimiterCell> {
        &self.limiter
    }

    /// The event counter shared with the reporter.
    pub fn counter(&self) -> &EventCounter {
        &self.counter
    }

    /// The last-accepted-rate gauge shared between controller and reporter.
    pub fn rate_gauge(&self) -> &Arc<RateGauge> {
        &self.gauge
    }

    /// The clock the filter was built with.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// How often the rate source is re-read once started.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// The reporter configuration the filter was built with.
    pub fn reporter_config(&self) -> &ReporterConfig {
        &self.reporter_config
    }

    /// Start the background poller and reporter on the current tokio
    /// runtime.
    ///
    /// The poller is spawned only when a rate source is configured; the
    /// reporter always runs. Subsequent calls are no-ops while the tasks
    /// are running.
    #[cfg(feature = "async")]
    pub fn start(&self) {
        let mut guard = self
            .tasks
            .lock()
            .expect("filter task mutex poisoned - a thread panicked while holding the lock");
        if guard.is_some() {
            return;
        }

        let poller = self.rate_source.as_ref().map(|source| {
            RateController::new(
                Arc::clone(source),
                Arc::clone(&self.limiter),
                Arc::clone(&self.gauge),
                Arc::clone(&self.clock),
            )
            .start(self.poll_interval)
        });

        let reporter = CountReporter::new(
            self.counter.clone(),
            Arc::clone(&self.gauge),
            self.count_sink.clone(),
            self.reporter_config.clone(),
        )
        .start(true);

        *guard = Some(BackgroundTasks { poller, reporter });
    }

    /// Stop the background tasks and emit the final count report.
    ///
    /// Invoked once during orderly shutdown; calling it without `start`,
    /// or a second time, is a no-op. In-flight `acquire` calls on the hot
    /// path are unaffected.
    ///
    /// # Errors
    /// Returns an error if a background task fails to shut down
    /// gracefully.
    #[cfg(feature = "async")]
    pub async fn shutdown(&self) -> Result<(), ShutdownError> {
        // Take the tasks while holding the lock, then release it before
        // awaiting.
        let tasks = {
            let mut guard = self
                .tasks
                .lock()
                .expect("filter task mutex poisoned - a thread panicked while holding the lock");
            guard.take()
        };

        if let Some(tasks) = tasks {
            if let Some(poller) = tasks.poller {
                poller.shutdown().await?;
            }
            tasks.reporter.shutdown().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ThrottleFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottleFilter")
            .field("limiter", &self.limiter)
            .field("limiting_configured", &self.rate_source.is_some())
            .field("persistence_configured", &self.count_sink.is_some())
            .finish()
    }
}
