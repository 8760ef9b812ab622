//! Application layer - orchestration of the rate control subsystem.
//!
//! This layer coordinates the domain logic and manages runtime behavior:
//! - The blocking limiter and the atomically-swappable limiter cell
//! - The rate controller (background poller)
//! - The event counter and its periodic reporter
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod controller;
pub mod counter;
pub mod limiter;
pub mod ports;
pub mod reporter;
