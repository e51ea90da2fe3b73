//! Application error types.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Trader error: {0}")]
    Trader(#[from] qdp_trader::TraderError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] qdp_gateway::GatewayError),

    #[error("Session not ready after {0:?}")]
    NotReady(Duration),
}

pub type AppResult<T> = Result<T, AppError>;
