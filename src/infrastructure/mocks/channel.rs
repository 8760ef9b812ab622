//! Mock rate and count channels for testing.

use crate::application::ports::{CountSink, CountWriteError, RateReadError, RateSource};
use crate::domain::rate::RateValue;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory rate channel emulating the external text resource.
///
/// Starts "absent" (reads fail like a missing file). `set_line` sets the
/// channel content, which is parsed at read time exactly like a file's
/// first line, so malformed content exercises the same failure paths.
///
/// Clones share the same underlying channel.
#[derive(Debug, Clone, Default)]
pub struct MockRateSource {
    line: Arc<Mutex<Option<String>>>,
    fail: Arc<AtomicBool>,
}

impl MockRateSource {
    /// Create an absent channel: reads fail until `set_line` is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the channel content, as if the backing file were overwritten.
    pub fn set_line(&self, line: &str) {
        let mut guard = self
            .line
            .lock()
            .expect("MockRateSource mutex poisoned - a test thread panicked while holding the lock");
        *guard = Some(line.to_string());
    }

    /// Make every read fail with an I/O error, regardless of content.
    pub fn fail_reads(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl RateSource for MockRateSource {
    fn read_rate(&self) -> Result<RateValue, RateReadError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RateReadError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected read failure",
            )));
        }
        let guard = self
            .line
            .lock()
            .expect("MockRateSource mutex poisoned - a test thread panicked while holding the lock");
        match guard.as_deref() {
            Some(line) => Ok(line.parse()?),
            None => Err(RateReadError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "rate channel absent",
            ))),
        }
    }
}

/// In-memory count channel recording every write.
///
/// Clones share the same underlying record.
#[derive(Debug, Clone, Default)]
pub struct MockCountSink {
    writes: Arc<Mutex<Vec<u64>>>,
    fail: Arc<AtomicBool>,
}

impl MockCountSink {
    /// Create a sink that accepts and records writes.
    pub fn new() -> Self {
        Self::default()
    }

    /// All counts written so far, oldest first.
    pub fn writes(&self) -> Vec<u64> {
        self.writes
            .lock()
            .expect("MockCountSink mutex poisoned - a test thread panicked while holding the lock")
            .clone()
    }

    /// The most recently written count.
    pub fn last(&self) -> Option<u64> {
        self.writes
            .lock()
            .expect("MockCountSink mutex poisoned - a test thread panicked while holding the lock")
            .last()
            .copied()
    }

    /// Make every write fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl CountSink for MockCountSink {
    fn write_count(&self, count: u64) -> Result<(), CountWriteError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CountWriteError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected write failure",
            )));
        }
        self.writes
            .lock()
            .expect("MockCountSink mutex poisoned - a test thread panicked while holding the lock")
            .push(count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_source_fails_like_missing_file() {
        let source = MockRateSource::new();
        assert!(matches!(source.read_rate(), Err(RateReadError::Io(_))));
    }

    #[test]
    fn test_source_parses_content_at_read_time() {
        let source = MockRateSource::new();

        source.set_line("2.5");
        assert_eq!(source.read_rate().unwrap().get(), 2.5);

        source.set_line("junk");
        assert!(matches!(source.read_rate(), Err(RateReadError::Invalid(_))));
    }

    #[test]
    fn test_source_injected_failure() {
        let source = MockRateSource::new();
        source.set_line("1.0");

        source.fail_reads(true);
        assert!(matches!(source.read_rate(), Err(RateReadError::Io(_))));

        source.fail_reads(false);
        assert!(source.read_rate().is_ok());
    }

    #[test]
    fn test_sink_records_writes_in_order() {
        let sink = MockCountSink::new();
        sink.write_count(1).unwrap();
        sink.write_count(5).unwrap();

        assert_eq!(sink.writes(), vec![1, 5]);
        assert_eq!(sink.last(), Some(5));
    }

    #[test]
    fn test_sink_injected_failure() {
        let sink = MockCountSink::new();
        sink.fail_writes(true);
        assert!(sink.write_count(1).is_err());
        assert!(sink.writes().is_empty());
    }
}
