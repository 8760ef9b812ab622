//! Mock implementations for testing.
//!
//! This module provides test doubles for infrastructure adapters,
//! enabling controlled testing of the rate control logic.

pub mod channel;
pub mod clock;
pub mod layer;

pub use channel::{MockCountSink, MockRateSource};
pub use clock::MockClock;
pub use layer::MockCaptureLayer;
