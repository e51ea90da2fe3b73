//! Prometheus metrics and structured logging for the QDP trading channel.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Prometheus metrics for session state, orders and the query dispatcher

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with, LogFormat};
pub use metrics::Metrics;
