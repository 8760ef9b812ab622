//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the
//! application layer needs. Infrastructure adapters implement these ports.

use crate::domain::rate::{ParseRateError, RateValue};
use std::fmt::Debug;
use std::io;
use std::time::Instant;

/// Port for obtaining current time.
///
/// This abstraction allows the application layer to work with time without
/// depending on system clock implementation details. Infrastructure
/// provides concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;
}

/// Error returned when the rate channel cannot produce a threshold.
///
/// Always recoverable: the poller logs it and retains the previous
/// configuration for that tick.
#[derive(Debug)]
pub enum RateReadError {
    /// The channel could not be read (missing file, permission, ...)
    Io(io::Error),
    /// The channel was read but its content is not a usable threshold
    Invalid(ParseRateError),
}

impl std::fmt::Display for RateReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateReadError::Io(e) => write!(f, "failed to read rate channel: {}", e),
            RateReadError::Invalid(e) => write!(f, "invalid rate channel content: {}", e),
        }
    }
}

impl std::error::Error for RateReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RateReadError::Io(e) => Some(e),
            RateReadError::Invalid(e) => Some(e),
        }
    }
}

impl From<io::Error> for RateReadError {
    fn from(e: io::Error) -> Self {
        RateReadError::Io(e)
    }
}

impl From<ParseRateError> for RateReadError {
    fn from(e: ParseRateError) -> Self {
        RateReadError::Invalid(e)
    }
}

/// Port for reading the operator-controlled rate threshold.
///
/// Infrastructure provides concrete implementations (FileRateSource,
/// MockRateSource).
pub trait RateSource: Send + Sync + Debug {
    /// Read one threshold from the channel.
    fn read_rate(&self) -> Result<RateValue, RateReadError>;
}

/// Error returned when the count channel cannot be written.
///
/// Always recoverable: the reporter logs it and skips persistence for that
/// tick; the in-memory counter is unaffected.
#[derive(Debug)]
pub enum CountWriteError {
    /// The channel could not be written
    Io(io::Error),
}

impl std::fmt::Display for CountWriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CountWriteError::Io(e) => write!(f, "failed to write count channel: {}", e),
        }
    }
}

impl std::error::Error for CountWriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CountWriteError::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for CountWriteError {
    fn from(e: io::Error) -> Self {
        CountWriteError::Io(e)
    }
}

/// Port for persisting the current event count.
///
/// Infrastructure provides concrete implementations (FileCountSink,
/// MockCountSink).
pub trait CountSink: Send + Sync + Debug {
    /// Overwrite the channel with the decimal representation of `count`.
    fn write_count(&self, count: u64) -> Result<(), CountWriteError>;
}
