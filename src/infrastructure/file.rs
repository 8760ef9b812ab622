//! File-backed rate and count channels.
//!
//! The rate channel is a text file whose first line is the desired
//! threshold; operators edit it while the pipeline runs. The count channel
//! is a text file overwritten with the current event total on every
//! reporter tick, for external monitoring.

use crate::application::ports::{CountSink, CountWriteError, RateReadError, RateSource};
use crate::domain::rate::RateValue;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Reads the rate threshold from the first line of a text file.
///
/// The file being absent, empty, or mid-write is an expected condition:
/// every failure mode surfaces as a recoverable `RateReadError`.
#[derive(Debug, Clone)]
pub struct FileRateSource {
    path: PathBuf,
}

impl FileRateSource {
    /// Create a source reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileRateSource { path: path.into() }
    }

    /// The path this source reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RateSource for FileRateSource {
    fn read_rate(&self) -> Result<RateValue, RateReadError> {
        let file = File::open(&self.path)?;
        let mut first_line = String::new();
        BufReader::new(file).read_line(&mut first_line)?;
        Ok(first_line.parse()?)
    }
}

/// Overwrites a text file with the decimal event count.
#[derive(Debug, Clone)]
pub struct FileCountSink {
    path: PathBuf,
}

impl FileCountSink {
    /// Create a sink writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCountSink { path: path.into() }
    }

    /// The path this sink writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CountSink for FileCountSink {
    fn write_count(&self, count: u64) -> Result<(), CountWriteError> {
        fs::write(&self.path, count.to_string())?;
        Ok(())
    }
}
