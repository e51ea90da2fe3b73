//! Gateway error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unknown gateway: {0}")]
    UnknownGateway(String),

    #[error("Gateway creation failed: {0}")]
    CreateFailed(String),

    #[error("Gateway not started")]
    NotStarted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
