//! Trading enums shared by requests and canonical records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// Open/close flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetType {
    #[default]
    Open,
    Close,
    CloseToday,
    CloseYesterday,
}

impl OffsetType {
    /// Returns true for any closing flag.
    #[must_use]
    pub fn is_close(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// Order price type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    AnyPrice,
    #[default]
    Limit,
    Best,
}

/// Time condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeCondition {
    /// Immediate-or-cancel.
    Ioc,
    /// Good-for-day.
    #[default]
    Gfd,
}

/// Order flag (time condition plus volume condition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderFlag {
    /// Resting day order.
    #[default]
    Normal,
    /// Fill-and-kill.
    Fak,
    /// Fill-or-kill.
    Fok,
}

impl fmt::Display for OrderFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "NOR"),
            Self::Fak => write!(f, "FAK"),
            Self::Fok => write!(f, "FOK"),
        }
    }
}

/// Order lifecycle state as reported by the counterparty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    AllTraded,
    PartTradedQueuing,
    PartTradedNotQueuing,
    NotTradedQueuing,
    NotTradedNotQueuing,
    Canceled,
    /// Accepted locally, no exchange state yet.
    #[default]
    Submitting,
}

impl OrderState {
    /// Returns true if the order can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AllTraded | Self::PartTradedNotQueuing | Self::NotTradedNotQueuing | Self::Canceled
        )
    }

    /// Returns true if the order is still working (can be cancelled).
    #[must_use]
    pub fn is_alive(&self) -> bool {
        !self.is_terminal()
    }
}

/// Instrument trading status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    BeforeTrading,
    #[default]
    NoTrading,
    Continuous,
    AuctionOrdering,
    AuctionBalance,
    AuctionMatch,
    Closed,
}
