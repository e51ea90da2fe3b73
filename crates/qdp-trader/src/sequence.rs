//! Session-scoped counters for order references and request ids.

use std::sync::atomic::{AtomicU32, Ordering};

/// Monotonic counter shared between callers and the gateway event path.
///
/// `seed` sets the last issued value; `next` returns one past it.
#[derive(Debug, Default)]
pub struct Sequence {
    last: AtomicU32,
}

impl Sequence {
    #[must_use]
    pub fn new(start: u32) -> Self {
        Self {
            last: AtomicU32::new(start),
        }
    }

    /// Reset the last issued value. Used once per login.
    pub fn seed(&self, last: u32) {
        self.last.store(last, Ordering::Release);
    }

    /// Issue the next value.
    pub fn next(&self) -> u32 {
        self.last.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// Last issued value.
    #[must_use]
    pub fn current(&self) -> u32 {
        self.last.load(Ordering::Acquire)
    }
}
