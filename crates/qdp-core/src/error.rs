//! Error types for qdp-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid entrust id: {0}")]
    InvalidEntrustId(String),

    #[error("{field} out of range: {value} (max {max})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("Invalid trading date: {0}")]
    InvalidTradingDate(u32),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
