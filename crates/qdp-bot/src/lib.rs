//! Host process for one QDP trading session.
//!
//! Loads configuration, picks a gateway from the registry, logs every
//! session callback and polls account state on an interval.

pub mod app;
pub mod config;
pub mod error;
pub mod sink;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use sink::LoggingSink;
