//! Instrument code to numeric id resolution.
//!
//! The order insert wire format identifies instruments by a numeric id that
//! only the gateway knows. The map is filled from the one-shot instrument
//! query sent right after login and rebuilt on every login.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct InstrumentResolver {
    ids: DashMap<String, i32>,
    complete: AtomicBool,
}

impl InstrumentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every mapping. Called on each successful login.
    pub fn reset(&self) {
        self.ids.clear();
        self.complete.store(false, Ordering::SeqCst);
    }

    pub fn insert(&self, code: &str, num: i32) {
        debug!(code, num, "Instrument id registered");
        self.ids.insert(code.to_string(), num);
    }

    /// Numeric id for `code`. Never guesses.
    #[must_use]
    pub fn resolve(&self, code: &str) -> Option<i32> {
        self.ids.get(code).map(|e| *e.value())
    }

    /// The terminal instrument record has arrived.
    pub fn mark_complete(&self) {
        self.complete.store(true, Ordering::SeqCst);
        info!(instruments = self.ids.len(), "Instrument map loaded");
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
