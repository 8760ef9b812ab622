//! Rate threshold values read from the external rate channel.
//!
//! A threshold is a single floating-point number. A positive value is a
//! target sustained rate in events per second; zero or a negative value is a
//! valid signal meaning "disable limiting". Anything that does not parse as
//! a plain finite float is a recoverable parse failure, never a crash.

use std::fmt;
use std::str::FromStr;

/// Error returned when a rate threshold cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseRateError {
    /// The input was empty or whitespace-only
    Empty,
    /// The input was not a floating-point number
    NotANumber(String),
    /// The input parsed but was not finite (NaN or infinity)
    NonFinite(String),
}

impl fmt::Display for ParseRateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseRateError::Empty => write!(f, "rate value is empty"),
            ParseRateError::NotANumber(s) => write!(f, "rate value {:?} is not a number", s),
            ParseRateError::NonFinite(s) => write!(f, "rate value {:?} is not finite", s),
        }
    }
}

impl std::error::Error for ParseRateError {}

/// A rate threshold in events per second.
///
/// Values `> 0` enable limiting at that rate; values `<= 0` disable
/// limiting entirely. Non-finite values are rejected at construction so
/// change detection by equality stays well-defined.
///
/// # Example
/// ```
/// use pipeline_throttle::RateValue;
///
/// let rate: RateValue = " 5.0 ".parse().unwrap();
/// assert!(rate.enables_limiting());
/// assert_eq!(rate.get(), 5.0);
///
/// let disabled: RateValue = "-1".parse().unwrap();
/// assert!(!disabled.enables_limiting());
///
/// assert!("".parse::<RateValue>().is_err());
/// assert!("fast".parse::<RateValue>().is_err());
/// assert!("NaN".parse::<RateValue>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateValue(f64);

impl RateValue {
    /// Create a rate value from a raw float.
    ///
    /// # Errors
    /// Returns `ParseRateError::NonFinite` for NaN or infinite input.
    pub fn new(value: f64) -> Result<Self, ParseRateError> {
        if !value.is_finite() {
            return Err(ParseRateError::NonFinite(value.to_string()));
        }
        Ok(RateValue(value))
    }

    /// The threshold in events per second.
    pub fn get(self) -> f64 {
        self.0
    }

    /// Whether this value calls for an active limiter.
    pub fn enables_limiting(self) -> bool {
        self.0 > 0.0
    }
}

impl FromStr for RateValue {
    type Err = ParseRateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseRateError::Empty);
        }
        let value: f64 = trimmed
            .parse()
            .map_err(|_| ParseRateError::NotANumber(trimmed.to_string()))?;
        if !value.is_finite() {
            return Err(ParseRateError::NonFinite(trimmed.to_string()));
        }
        Ok(RateValue(value))
    }
}

impl fmt::Display for RateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
