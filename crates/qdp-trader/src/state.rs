//! Session login and readiness state.
//!
//! ```text
//! NotLoggedIn ──login──▶ Authenticating ──ok──▶ LoggedIn ──▶ Ready
//!                              │
//!                              └──fail──▶ LoginFailed
//! any ──disconnect/logout──▶ NotLoggedIn
//! ```
//!
//! Changes are broadcast on a watch channel so callers can wait for
//! readiness without polling.

use std::fmt;

use parking_lot::Mutex;
use qdp_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{TraderError, TraderResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    NotLoggedIn,
    Authenticating,
    LoggedIn,
    LoginFailed,
    Ready,
}

impl SessionState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotLoggedIn => "not_logged_in",
            Self::Authenticating => "authenticating",
            Self::LoggedIn => "logged_in",
            Self::LoginFailed => "login_failed",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner of the session state.
///
/// Transitions are checked under a single lock so two concurrent `login`
/// calls cannot both start an attempt.
#[derive(Debug)]
pub struct SessionStateMachine {
    state: Mutex<SessionState>,
    tx: watch::Sender<SessionState>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::NotLoggedIn);
        Self {
            state: Mutex::new(SessionState::NotLoggedIn),
            tx,
        }
    }

    #[must_use]
    pub fn current(&self) -> SessionState {
        *self.state.lock()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.current() == SessionState::Ready
    }

    /// Start a login attempt. Fails if one is already outstanding.
    pub fn begin_login(&self) -> TraderResult<()> {
        let mut state = self.state.lock();
        if *state == SessionState::Authenticating {
            return Err(TraderError::LoginInProgress);
        }
        self.set(&mut state, SessionState::Authenticating);
        Ok(())
    }

    /// Login response accepted.
    pub fn logged_in(&self) {
        let mut state = self.state.lock();
        if *state != SessionState::Authenticating {
            warn!(from = %*state, "Login success outside an attempt");
        }
        self.set(&mut state, SessionState::LoggedIn);
    }

    /// Optimistic readiness right after login. Only valid from `LoggedIn`.
    pub fn mark_ready(&self) -> bool {
        let mut state = self.state.lock();
        if *state != SessionState::LoggedIn {
            warn!(from = %*state, "Refusing Ready transition");
            return false;
        }
        self.set(&mut state, SessionState::Ready);
        true
    }

    pub fn login_failed(&self) {
        let mut state = self.state.lock();
        self.set(&mut state, SessionState::LoginFailed);
    }

    /// Transport lost or logged out.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        self.set(&mut state, SessionState::NotLoggedIn);
    }

    fn set(&self, state: &mut SessionState, next: SessionState) {
        if *state == next {
            return;
        }
        debug!(from = %*state, to = %next, "Session state changed");
        *state = next;
        Metrics::session_state_set(next.as_str());
        self.tx.send_replace(next);
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Wait until the session is ready.
    ///
    /// Returns immediately if already ready.
    pub async fn wait_until_ready(&self) {
        let mut rx = self.tx.subscribe();
        // Only fails if the sender is dropped, which outlives `self`.
        let _ = rx.wait_for(|s| *s == SessionState::Ready).await;
    }
}
