//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,qdp=debug";

/// Output format of the log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, with span context.
    Json,
    /// Multi-line human readable output.
    Pretty,
}

impl LogFormat {
    /// `QDP_LOG_FORMAT=json|pretty`, else JSON when `RUST_ENV=production`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::resolve(
            std::env::var("QDP_LOG_FORMAT").ok().as_deref(),
            std::env::var("RUST_ENV").ok().as_deref(),
        )
    }

    fn resolve(explicit: Option<&str>, rust_env: Option<&str>) -> Self {
        match explicit.map(str::to_ascii_lowercase).as_deref() {
            Some("json") => Self::Json,
            Some("pretty") => Self::Pretty,
            _ if rust_env == Some("production") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Initialize structured logging with the format taken from the environment.
///
/// The filter comes from `RUST_LOG` and defaults to `info,qdp=debug`.
pub fn init_logging() -> TelemetryResult<()> {
    init_logging_with(LogFormat::from_env())
}

pub fn init_logging_with(format: LogFormat) -> TelemetryResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(false))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_target(true).with_thread_names(true))
            .try_init(),
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
