//! Vendor records delivered with gateway callbacks.
//!
//! Field names follow the vendor structures. Prices and amounts stay `f64`
//! and enum-like fields stay single-character codes (see [`crate::codes`]);
//! conversion to canonical types happens in the session's translator.

use serde::{Deserialize, Serialize};

/// Response status attached to every callback.
///
/// `error_id == 0` means success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspInfo {
    pub error_id: i32,
    pub error_msg: String,
}

impl RspInfo {
    /// Successful response.
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(error_id: i32, error_msg: impl Into<String>) -> Self {
        Self {
            error_id,
            error_msg: error_msg.into(),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error_id != 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspUserLoginField {
    pub broker_id: String,
    pub user_id: String,
    pub session_id: u64,
    /// Highest local order id already used by this user.
    pub max_order_local_id: u32,
    /// `YYYYMMDD`.
    pub trading_day: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderField {
    pub instrument_id: String,
    pub exchange_id: String,
    pub order_sys_id: String,
    pub user_order_local_id: u32,
    pub direction: char,
    pub offset_flag: char,
    pub hedge_flag: char,
    pub order_price_type: char,
    pub limit_price: f64,
    pub volume: i32,
    pub volume_traded: i32,
    pub volume_remain: i32,
    pub time_condition: char,
    pub volume_condition: char,
    /// `HH:MM:SS`.
    pub insert_time: String,
    pub order_status: char,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeField {
    pub trade_id: String,
    pub order_sys_id: String,
    pub user_order_local_id: u32,
    pub instrument_id: String,
    pub exchange_id: String,
    pub direction: char,
    pub offset_flag: char,
    pub hedge_flag: char,
    pub trade_price: f64,
    pub trade_volume: i32,
    /// `HH:MM:SS`.
    pub trade_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestorAccountField {
    pub investor_id: String,
    pub pre_balance: f64,
    pub close_profit: f64,
    pub position_profit: f64,
    pub margin: f64,
    pub available: f64,
    pub fee: f64,
    pub frozen_margin: f64,
    pub frozen_fee: f64,
    pub deposit: f64,
    pub withdraw: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestorPositionField {
    pub instrument_id: String,
    pub exchange_id: String,
    /// Buy side is the long position.
    pub direction: char,
    pub hedge_flag: char,
    pub position: i32,
    pub today_position: i32,
    pub used_margin: f64,
    pub position_profit: f64,
    pub position_cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentField {
    pub instrument_id: String,
    pub exchange_id: String,
    pub instrument_id_num: i32,
    pub volume_multiple: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentStatusField {
    pub exchange_id: String,
    pub instrument_id: String,
    pub instrument_status: char,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsp_info_default_is_ok() {
        assert!(!RspInfo::ok().is_error());
        assert!(RspInfo::error(31, "insufficient margin").is_error());
    }
}
