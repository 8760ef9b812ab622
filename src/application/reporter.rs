//! Periodic reporting and persistence of the event count.
//!
//! Each tick reads the counter, logs on a slower cadence controlled by
//! `log_delay`, and writes the count to the sink when persistence is
//! configured. Write failures are logged and otherwise ignored; the
//! in-memory counter is the source of truth and the sink is best-effort.

use crate::application::controller::RateGauge;
use crate::application::counter::EventCounter;
use crate::application::ports::CountSink;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "async")]
use tokio::sync::watch;

/// Error returned when reporter configuration validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReporterConfigError {
    /// Report interval duration must be greater than zero
    ZeroReportInterval,
}

impl std::fmt::Display for ReporterConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReporterConfigError::ZeroReportInterval => {
                write!(f, "report interval must be greater than 0")
            }
        }
    }
}

impl std::error::Error for ReporterConfigError {}

/// Configuration for count reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct ReporterConfig {
    /// How often the reporter ticks
    pub interval: Duration,
    /// Ticks between log emissions; `<= 0` disables periodic logging
    pub log_delay: i64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            log_delay: 30,
        }
    }
}

impl ReporterConfig {
    /// Create a reporter config with the specified tick interval.
    ///
    /// # Errors
    /// Returns `ReporterConfigError::ZeroReportInterval` if `interval` is
    /// zero.
    pub fn new(interval: Duration) -> Result<Self, ReporterConfigError> {
        if interval.is_zero() {
            return Err(ReporterConfigError::ZeroReportInterval);
        }
        Ok(Self {
            interval,
            log_delay: 30,
        })
    }

    /// Set the number of ticks between log emissions.
    pub fn with_log_delay(mut self, log_delay: i64) -> Self {
        self.log_delay = log_delay;
        self
    }
}

/// Emits the event count periodically to the log and the count sink.
pub struct CountReporter {
    counter: EventCounter,
    gauge: Arc<RateGauge>,
    sink: Option<Arc<dyn CountSink>>,
    config: ReporterConfig,
}

impl CountReporter {
    /// Create a reporter.
    ///
    /// `sink = None` disables count persistence; logging alone still runs
    /// per `config.log_delay`.
    pub fn new(
        counter: EventCounter,
        gauge: Arc<RateGauge>,
        sink: Option<Arc<dyn CountSink>>,
        config: ReporterConfig,
    ) -> Self {
        CountReporter {
            counter,
            gauge,
            sink,
            config,
        }
    }

    /// Run one reporter tick.
    ///
    /// Records the tick, emits a log line every `log_delay`-th tick, and
    /// persists the current total on every tick when a sink is configured.
    /// Sink failures are logged and do not affect the counter or later
    /// ticks.
    pub fn tick(&self) {
        let total = self.counter.total();
        let ticks = self.counter.record_tick();

        let delay = self.config.log_delay;
        if delay > 0 && ticks % delay as u64 == 0 {
            tracing::info!(events = total, rate = self.gauge.get(), "processed event count");
        }

        if let Some(sink) = &self.sink {
            if let Err(error) = sink.write_count(total) {
                tracing::error!(error = %error, "failed to persist event count");
            }
        }
    }

    /// Emit the final count report.
    ///
    /// Called once during orderly shutdown.
    pub fn final_report(&self) {
        tracing::info!(
            events = self.counter.total(),
            rate = self.gauge.get(),
            "final event count at shutdown"
        );
    }

    /// Get the reporter configuration.
    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    /// Spawn the tick loop on the current tokio runtime.
    ///
    /// The first tick runs immediately, then one per configured interval
    /// with fixed-delay semantics. When `emit_final` is set, the final
    /// count report is emitted once after the loop stops.
    #[cfg(feature = "async")]
    pub fn start(self, emit_final: bool) -> ReporterHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.tick(),
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            if emit_final {
                self.final_report();
            }
        });
        ReporterHandle { shutdown_tx, task }
    }
}

impl std::fmt::Debug for CountReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountReporter")
            .field("sink", &self.sink)
            .field("config", &self.config)
            .finish()
    }
}

/// Error returned when a background task fails to shut down gracefully.
#[cfg(feature = "async")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    /// The task had already died from a panic
    TaskPanicked,
}

#[cfg(feature = "async")]
impl std::fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownError::TaskPanicked => {
                write!(f, "background task panicked before shutdown completed")
            }
        }
    }
}

#[cfg(feature = "async")]
impl std::error::Error for ShutdownError {}

/// Handle to a running reporter loop.
#[cfg(feature = "async")]
#[derive(Debug)]
pub struct ReporterHandle {
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

#[cfg(feature = "async")]
impl ReporterHandle {
    /// Stop the tick loop and wait for it to exit.
    ///
    /// If the loop was started with `emit_final`, the final count report
    /// has been emitted by the time this returns.
    ///
    /// # Errors
    /// Returns `ShutdownError::TaskPanicked` if the loop died abnormally.
    pub async fn shutdown(self) -> Result<(), ShutdownError> {
        let _ = self.shutdown_tx.send(true);
        self.task.await.map_err(|_| ShutdownError::TaskPanicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::MockCountSink;

    fn reporter_with(
        sink: Option<Arc<dyn CountSink>>,
        log_delay: i64,
    ) -> (CountReporter, EventCounter, Arc<RateGauge>) {
        let counter = EventCounter::new();
        let gauge = Arc::new(RateGauge::new());
        let config = ReporterConfig::default().with_log_delay(log_delay);
        let reporter = CountReporter::new(counter.clone(), Arc::clone(&gauge), sink, config);
        (reporter, counter, gauge)
    }

    #[test]
    fn test_config_rejects_zero_interval() {
        assert_eq!(
            ReporterConfig::new(Duration::ZERO),
            Err(ReporterConfigError::ZeroReportInterval)
        );
    }

    #[test]
    fn test_config_defaults() {
        let config = ReporterConfig::default();
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.log_delay, 30);
    }

    #[test]
    fn test_tick_records_tick_ordinals() {
        let (reporter, counter, _) = reporter_with(None, 0);
        reporter.tick();
        reporter.tick();
        assert_eq!(counter.ticks(), 2);
    }

    #[test]
    fn test_tick_persists_current_total_every_tick() {
        let sink = MockCountSink::new();
        let (reporter, counter, _) = reporter_with(Some(Arc::new(sink.clone())), 30);

        counter.add(12);
        reporter.tick();
        counter.add(8);
        reporter.tick();

        // Persistence is not gated by log_delay
        assert_eq!(sink.writes(), vec![12, 20]);
    }

    #[test]
    fn test_tick_without_sink_only_counts() {
        let (reporter, counter, _) = reporter_with(None, 30);
        counter.add(5);
        reporter.tick();
        assert_eq!(counter.total(), 5);
        assert_eq!(counter.ticks(), 1);
    }

    #[test]
    fn test_sink_failure_is_swallowed() {
        let sink = MockCountSink::new();
        sink.fail_writes(true);
        let (reporter, counter, _) = reporter_with(Some(Arc::new(sink.clone())), 30);

        counter.add(4);
        reporter.tick();
        reporter.tick();

        // Nothing persisted, but ticks and counter march on
        assert!(sink.writes().is_empty());
        assert_eq!(counter.ticks(), 2);
        assert_eq!(counter.total(), 4);

        sink.fail_writes(false);
        reporter.tick();
        assert_eq!(sink.writes(), vec![4]);
    }

    #[test]
    fn test_tick_reads_count_before_recording_tick() {
        let sink = MockCountSink::new();
        let (reporter, counter, _) = reporter_with(Some(Arc::new(sink.clone())), 30);

        counter.add(1);
        reporter.tick();
        assert_eq!(sink.last(), Some(1));
    }
}
