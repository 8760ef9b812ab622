//! Rate controller - keeps the active limiter in sync with the external
//! rate channel.
//!
//! On every poll the controller reads one threshold from the rate source
//! and compares it with the last value it accepted. Unchanged values are
//! ignored so a stable channel never churns the limiter; changed values
//! either install a freshly-built limiter or tear limiting down, published
//! through the cell as a single atomic swap. Read and parse failures leave
//! the current configuration untouched - the channel being briefly absent
//! or mid-write is an expected condition.

use crate::application::limiter::{Limiter, LimiterCell};
use crate::application::ports::{Clock, RateSource};
use crate::domain::rate::RateValue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[cfg(feature = "async")]
use crate::application::reporter::ShutdownError;
#[cfg(feature = "async")]
use std::time::Duration;
#[cfg(feature = "async")]
use tokio::sync::watch;

/// The most recently accepted rate, readable by the reporter for log
/// context.
///
/// Stored as raw `f64` bits in an atomic; written only by the controller.
/// Defaults to `0.0` until the first accepted read.
#[derive(Debug, Default)]
pub struct RateGauge {
    bits: AtomicU64,
}

impl RateGauge {
    /// Create a gauge reading `0.0`.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self, rate: f64) {
        self.bits.store(rate.to_bits(), Ordering::Relaxed);
    }

    /// The last accepted rate value.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Polls the rate source and swaps the active limiter on change.
pub struct RateController {
    source: Arc<dyn RateSource>,
    limiter: Arc<LimiterCell>,
    gauge: Arc<RateGauge>,
    clock: Arc<dyn Clock>,
    last_observed: Option<RateValue>,
}

impl RateController {
    /// Create a controller publishing into `limiter` and `gauge`.
    pub fn new(
        source: Arc<dyn RateSource>,
        limiter: Arc<LimiterCell>,
        gauge: Arc<RateGauge>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        RateController {
            source,
            limiter,
            gauge,
            clock,
            last_observed: None,
        }
    }

    /// The last rate value this controller accepted, if any.
    pub fn last_observed(&self) -> Option<RateValue> {
        self.last_observed
    }

    /// Run one poll cycle.
    ///
    /// Reads a threshold, decides whether the limiter must change, and
    /// publishes the new configuration atomically. Failures are logged and
    /// leave both the limiter and the last observed value untouched; this
    /// method never panics on channel problems.
    pub fn poll(&mut self) {
        let value = match self.source.read_rate() {
            Ok(value) => value,
            Err(error) => {
                tracing::error!(error = %error, "failed to read rate threshold");
                return;
            }
        };

        if self.last_observed == Some(value) {
            return;
        }

        let previous = self.last_observed.map(RateValue::get);
        if value.enables_limiting() {
            let limiter = match Limiter::new(value, Arc::clone(&self.clock)) {
                Ok(limiter) => limiter,
                Err(error) => {
                    tracing::error!(error = %error, "rejected rate threshold");
                    return;
                }
            };
            self.limiter.install(Arc::new(limiter));
            tracing::warn!(
                previous,
                rate = value.get(),
                "rate changed, installed new limiter"
            );
        } else {
            self.limiter.clear();
            tracing::warn!(
                previous,
                rate = value.get(),
                "rate not positive, limiting disabled"
            );
        }

        self.gauge.set(value.get());
        self.last_observed = Some(value);
    }

    /// Spawn the poll loop on the current tokio runtime.
    ///
    /// The first poll runs immediately, then one per `interval` with
    /// fixed-delay semantics. The loop runs independently of event traffic
    /// and survives any number of failed polls. `interval` must be
    /// non-zero.
    #[cfg(feature = "async")]
    pub fn start(mut self, interval: Duration) -> PollerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.poll(),
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });
        PollerHandle { shutdown_tx, task }
    }
}

impl std::fmt::Debug for RateController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateController")
            .field("source", &self.source)
            .field("last_observed", &self.last_observed)
            .finish()
    }
}

/// Handle to a running poll loop.
#[cfg(feature = "async")]
#[derive(Debug)]
pub struct PollerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

#[cfg(feature = "async")]
impl PollerHandle {
    /// Stop the poll loop and wait for it to exit.
    ///
    /// The limiter cell keeps its last published configuration; in-flight
    /// `acquire` calls complete naturally.
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
    use crate::infrastructure::mocks::{MockClock, MockRateSource};
    use std::sync::Arc;
    use std::time::Instant;

    fn controller_with(source: MockRateSource) -> (RateController, Arc<LimiterCell>, Arc<RateGauge>) {
        let cell = Arc::new(LimiterCell::new());
        let gauge = Arc::new(RateGauge::new());
        let clock = Arc::new(MockClock::new(Instant::now()));
        let controller = RateController::new(
            Arc::new(source),
            Arc::clone(&cell),
            Arc::clone(&gauge),
            clock,
        );
        (controller, cell, gauge)
    }

    #[test]
    fn test_positive_rate_installs_limiter() {
        let source = MockRateSource::new();
        source.set_line("5.0");
        let (mut controller, cell, gauge) = controller_with(source);

        controller.poll();

        let limiter = cell.current().expect("limiter installed");
        assert_eq!(limiter.rate(), 5.0);
        assert_eq!(gauge.get(), 5.0);
        assert_eq!(controller.last_observed().unwrap().get(), 5.0);
    }

    #[test]
    fn test_unchanged_rate_is_a_no_op() {
        let source = MockRateSource::new();
        source.set_line("5.0");
        let (mut controller, cell, _) = controller_with(source);

        controller.poll();
        let first = cell.current().unwrap();

        controller.poll();
        let second = cell.current().unwrap();

        // Identity check: a stable channel never reallocates the limiter
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_changed_rate_replaces_limiter() {
        let source = MockRateSource::new();
        source.set_line("5.0");
        let (mut controller, cell, gauge) = controller_with(source.clone());

        controller.poll();
        let first = cell.current().unwrap();

        source.set_line("20");
        controller.poll();
        let second = cell.current().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.rate(), 20.0);
        assert_eq!(gauge.get(), 20.0);
    }

    #[test]
    fn test_non_positive_rate_disables_limiting() {
        let source = MockRateSource::new();
        source.set_line("5.0");
        let (mut controller, cell, gauge) = controller_with(source.clone());

        controller.poll();
        assert!(cell.is_limiting());

        source.set_line("0");
        controller.poll();

        assert!(!cell.is_limiting());
        assert_eq!(gauge.get(), 0.0);
        assert_eq!(controller.last_observed().unwrap().get(), 0.0);
    }

    #[test]
    fn test_negative_rate_disables_limiting() {
        let source = MockRateSource::new();
        source.set_line("-1");
        let (mut controller, cell, _) = controller_with(source);

        controller.poll();
        assert!(!cell.is_limiting());
        assert_eq!(controller.last_observed().unwrap().get(), -1.0);
    }

    #[test]
    fn test_read_failure_retains_configuration() {
        let source = MockRateSource::new();
        source.set_line("5.0");
        let (mut controller, cell, gauge) = controller_with(source.clone());

        controller.poll();
        let installed = cell.current().unwrap();

        source.fail_reads(true);
        controller.poll();

        // Limiter and last observed value survive the failed tick
        assert!(Arc::ptr_eq(&cell.current().unwrap(), &installed));
        assert_eq!(gauge.get(), 5.0);
        assert_eq!(controller.last_observed().unwrap().get(), 5.0);
    }

    #[test]
    fn test_parse_failure_retains_configuration() {
        let source = MockRateSource::new();
        source.set_line("5.0");
        let (mut controller, cell, _) = controller_with(source.clone());

        controller.poll();
        let installed = cell.current().unwrap();

        source.set_line("not-a-rate");
        controller.poll();

        assert!(Arc::ptr_eq(&cell.current().unwrap(), &installed));
        assert_eq!(controller.last_observed().unwrap().get(), 5.0);
    }

    #[test]
    fn test_absent_channel_never_installs() {
        let source = MockRateSource::new();
        let (mut controller, cell, _) = controller_with(source);

        controller.poll();
        assert!(!cell.is_limiting());
        assert!(controller.last_observed().is_none());
    }

    #[test]
    fn test_recovery_after_failures() {
        let source = MockRateSource::new();
        let (mut controller, cell, _) = controller_with(source.clone());

        source.fail_reads(true);
        controller.poll();
        controller.poll();
        assert!(!cell.is_limiting());

        source.fail_reads(false);
        source.set_line("2.5");
        controller.poll();

        assert_eq!(cell.current().unwrap().rate(), 2.5);
    }

    #[test]
    fn test_gauge_tracks_disable_values() {
        let source = MockRateSource::new();
        source.set_line("-4");
        let (mut controller, _, gauge) = controller_with(source);

        controller.poll();
        assert_eq!(gauge.get(), -4.0);
    }
}
