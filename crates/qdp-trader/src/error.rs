//! Session engine error types.

use qdp_cache::CacheError;
use qdp_core::CoreError;
use qdp_gateway::GatewayError;
use thiserror::Error;

use crate::state::SessionState;

/// Errors returned by session operations or delivered to the sink.
///
/// Synchronous failures never reach the gateway. Asynchronous failures
/// (`Business`, `CancelRejected`, failed logins) are handed to the
/// [`TraderSink`](crate::TraderSink) instead of being returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TraderError {
    #[error("No live gateway session")]
    Transport,

    #[error("Session not ready (state: {0})")]
    NotReady(SessionState),

    #[error("Login already in progress")]
    LoginInProgress,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Login failed: {0}")]
    Login(String),

    #[error("Unknown instrument: {0}")]
    Resolution(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Sending {request} failed with code {code}")]
    Submission { request: &'static str, code: i32 },

    #[error("Business error {code}: {message}")]
    Business { code: i32, message: String },

    #[error("Cancel rejected {code}: {message}")]
    CancelRejected { code: i32, message: String },

    #[error("Format error: {0}")]
    Format(#[from] CoreError),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Query dispatcher stopped")]
    DispatcherStopped,
}

impl TraderError {
    /// Integer code for callers that need a single status value.
    ///
    /// Local failures are negative. Send failures and gateway responses
    /// carry the vendor code.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Transport | Self::NotReady(_) => -1,
            Self::LoginInProgress => -2,
            Self::Resolution(_) => -3,
            Self::Format(_) => -4,
            Self::Authentication(_) => -5,
            Self::Login(_) => -6,
            Self::Cache(_) => -7,
            Self::Gateway(_) => -8,
            Self::InvalidConfig(_) => -9,
            Self::DispatcherStopped => -10,
            Self::InvalidOrder(_) => -11,
            Self::Submission { code, .. }
            | Self::Business { code, .. }
            | Self::CancelRejected { code, .. } => *code,
        }
    }

    /// Returns true for failures detected before anything was sent.
    #[must_use]
    pub fn is_local(&self) -> bool {
        !matches!(
            self,
            Self::Submission { .. } | Self::Business { .. } | Self::CancelRejected { .. }
        )
    }
}

impl From<GatewayError> for TraderError {
    fn from(e: GatewayError) -> Self {
        Self::Gateway(e.to_string())
    }
}

impl From<CacheError> for TraderError {
    fn from(e: CacheError) -> Self {
        Self::Cache(e.to_string())
    }
}

pub type TraderResult<T> = Result<T, TraderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(TraderError::Transport.code(), -1);
        assert_eq!(TraderError::NotReady(SessionState::NotLoggedIn).code(), -1);
        assert_eq!(
            TraderError::Submission {
                request: "order_insert",
                code: -3
            }
            .code(),
            -3
        );
        assert_eq!(
            TraderError::Business {
                code: 31,
                message: "no margin".into()
            }
            .code(),
            31
        );
    }

    #[test]
    fn test_is_local() {
        assert!(TraderError::Resolution("cu2405".into()).is_local());
        assert!(TraderError::InvalidOrder("volume".into()).is_local());
        assert_eq!(TraderError::InvalidOrder("volume".into()).code(), -11);
        assert!(!TraderError::CancelRejected {
            code: 25,
            message: String::new()
        }
        .is_local());
    }

    #[test]
    fn test_format_from_core() {
        let err: TraderError = CoreError::InvalidEntrustId("x".into()).into();
        assert!(matches!(err, TraderError::Format(_)));
        assert_eq!(err.code(), -4);
    }
}
