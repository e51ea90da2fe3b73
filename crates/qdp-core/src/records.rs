//! Requests from and records for the caller.
//!
//! `Entrust` and `EntrustAction` flow in from the caller. The canonical
//! records flow out to the caller's sink, built from gateway records plus
//! contract data and cached correlation tags.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entrust::EntrustId;
use crate::types::{Direction, OffsetType, OrderFlag, OrderState, PriceType};

/// Static contract data resolved from the external contract lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub code: String,
    pub exchange: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Contract multiplier.
    #[serde(default = "default_vol_scale")]
    pub vol_scale: u32,
}

fn default_currency() -> String {
    "CNY".to_string()
}

fn default_vol_scale() -> u32 {
    1
}

impl ContractInfo {
    pub fn new(code: impl Into<String>, exchange: impl Into<String>, vol_scale: u32) -> Self {
        Self {
            code: code.into(),
            exchange: exchange.into(),
            currency: default_currency(),
            vol_scale,
        }
    }
}

/// Order submission request, and the acknowledgement record for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrust {
    pub code: String,
    pub exchange: String,
    pub price: Decimal,
    pub volume: u32,
    pub direction: Direction,
    pub offset: OffsetType,
    pub price_type: PriceType,
    pub order_flag: OrderFlag,
    /// Pre-allocated id. Generated at submission when absent.
    pub entrust_id: Option<EntrustId>,
    /// Caller correlation tag, never sent to the gateway.
    pub user_tag: Option<String>,
}

impl Entrust {
    /// Create a limit, open, day order.
    pub fn new(
        code: impl Into<String>,
        exchange: impl Into<String>,
        price: Decimal,
        volume: u32,
        direction: Direction,
    ) -> Self {
        Self {
            code: code.into(),
            exchange: exchange.into(),
            price,
            volume,
            direction,
            offset: OffsetType::Open,
            price_type: PriceType::Limit,
            order_flag: OrderFlag::Normal,
            entrust_id: None,
            user_tag: None,
        }
    }

    #[must_use]
    pub fn with_offset(mut self, offset: OffsetType) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn with_price_type(mut self, price_type: PriceType) -> Self {
        self.price_type = price_type;
        self
    }

    #[must_use]
    pub fn with_order_flag(mut self, order_flag: OrderFlag) -> Self {
        self.order_flag = order_flag;
        self
    }

    #[must_use]
    pub fn with_entrust_id(mut self, entrust_id: EntrustId) -> Self {
        self.entrust_id = Some(entrust_id);
        self
    }

    #[must_use]
    pub fn with_user_tag(mut self, tag: impl Into<String>) -> Self {
        self.user_tag = Some(tag.into());
        self
    }

    /// Non-empty user tag, if any.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.user_tag.as_deref().filter(|t| !t.is_empty())
    }
}

/// Cancel request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrustAction {
    pub code: String,
    pub exchange: String,
    /// Raw entrust id as reported on the order; decoded at cancel time.
    pub entrust_id: String,
    /// Order-system-id assigned by the exchange.
    pub order_id: String,
}

/// Order record from a push or an order query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalOrder {
    pub contract: ContractInfo,
    pub code: String,
    pub exchange: String,
    pub price: Decimal,
    pub volume: u32,
    pub direction: Direction,
    pub offset: OffsetType,
    pub price_type: PriceType,
    pub order_flag: OrderFlag,
    pub traded: u32,
    pub left: u32,
    pub order_date: u32,
    pub order_time: Option<NaiveDateTime>,
    pub state: OrderState,
    pub entrust_id: EntrustId,
    /// Order-system-id; empty until the exchange accepts the order.
    pub order_id: String,
    /// Cached caller tag, or the entrust id when none was supplied.
    pub user_tag: String,
}

/// Trade record from a push or a trade query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTrade {
    pub contract: ContractInfo,
    pub code: String,
    pub exchange: String,
    pub trade_id: String,
    pub price: Decimal,
    pub volume: u32,
    pub direction: Direction,
    pub offset: OffsetType,
    pub trade_date: u32,
    pub trade_time: Option<NaiveDateTime>,
    /// Order-system-id of the parent order.
    pub ref_order: String,
    /// `vol_scale * volume * price`.
    pub amount: Decimal,
    pub user_tag: Option<String>,
}

/// Account funds snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CanonicalAccount {
    pub pre_balance: Decimal,
    pub close_profit: Decimal,
    pub dyn_profit: Decimal,
    pub margin: Decimal,
    pub available: Decimal,
    pub commission: Decimal,
    pub frozen_margin: Decimal,
    pub frozen_commission: Decimal,
    pub deposit: Decimal,
    pub withdraw: Decimal,
    pub balance: Decimal,
    pub currency: String,
}

/// Position snapshot for one contract and direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPosition {
    pub contract: ContractInfo,
    pub code: String,
    pub exchange: String,
    pub currency: String,
    pub direction: Direction,
    /// Opened today.
    pub new_position: u32,
    /// Carried over from previous days.
    pub pre_position: u32,
    pub margin: Decimal,
    pub dyn_profit: Decimal,
    pub position_cost: Decimal,
    pub avg_price: Decimal,
}

impl CanonicalPosition {
    #[must_use]
    pub fn total_position(&self) -> u32 {
        self.new_position + self.pre_position
    }

    /// Aggregation key within one position query.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}-{}", self.code, self.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_entrust_builder() {
        let e = Entrust::new("cu2405", "SHFE", dec!(70000), 2, Direction::Short)
            .with_offset(OffsetType::CloseToday)
            .with_order_flag(OrderFlag::Fak)
            .with_user_tag("T1");
        assert_eq!(e.offset, OffsetType::CloseToday);
        assert_eq!(e.order_flag, OrderFlag::Fak);
        assert_eq!(e.price_type, PriceType::Limit);
        assert_eq!(e.tag(), Some("T1"));
        assert!(e.entrust_id.is_none());
    }

    #[test]
    fn test_empty_tag_is_none() {
        let e = Entrust::new("cu2405", "SHFE", dec!(1), 1, Direction::Long).with_user_tag("");
        assert_eq!(e.tag(), None);
    }

    #[test]
    fn test_contract_defaults() {
        let c: ContractInfo = serde_json::from_str(r#"{"code":"ag2406","exchange":"SHFE"}"#).unwrap();
        assert_eq!(c.currency, "CNY");
        assert_eq!(c.vol_scale, 1);
    }
}
