//! Core domain types for the QDP trading channel.
//!
//! This crate provides the types shared by the gateway, cache and session
//! crates:
//! - `EntrustId`: session-scoped order identifier (`SSSSSSSSSS#RRRRRR`)
//! - `investor_id_to_num`: numeric account id required by the order wire format
//! - Trading enums (`Direction`, `OffsetType`, `PriceType`, `OrderFlag`, ...)
//! - Canonical records handed to the caller's sink

pub mod entrust;
pub mod error;
pub mod investor;
pub mod records;
pub mod time;
pub mod types;

pub use entrust::EntrustId;
pub use error::{CoreError, Result};
pub use investor::investor_id_to_num;
pub use time::{make_time, to_decimal};
pub use types::{
    Direction, OffsetType, OrderFlag, OrderState, PriceType, TimeCondition, TradeStatus,
};

// Records exchanged with the caller
pub use records::{
    CanonicalAccount, CanonicalOrder, CanonicalPosition, CanonicalTrade, ContractInfo, Entrust,
    EntrustAction,
};
