//! Cache error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid trading date: {0}")]
    InvalidTradingDate(u32),
}

pub type CacheResult<T> = Result<T, CacheError>;
