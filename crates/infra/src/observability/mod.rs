//! Logging bootstrap
//!
//! Library code only emits `tracing` events; the host process calls
//! [`logging::init`] once to install a subscriber.

pub mod logging;

pub use logging::{init, LoggingError};
