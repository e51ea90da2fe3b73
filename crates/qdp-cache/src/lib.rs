//! Durable key to tag caches for the QDP trading channel.
//!
//! The gateway never echoes caller correlation tags. The session keeps two
//! of these caches (entrust id to tag, order-system-id to tag) so tags survive
//! the hop from order submission to trade reports, and a process restart
//! within the same trading day.

pub mod error;
pub mod tag_cache;

pub use error::{CacheError, CacheResult};
pub use tag_cache::{RetentionPolicy, TagCache, TagEntry};
