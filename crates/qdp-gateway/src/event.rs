//! Vendor callbacks, delivered as values over the gateway event channel.

use crate::fields::{
    InstrumentField, InstrumentStatusField, InvestorAccountField, InvestorPositionField,
    OrderField, RspInfo, RspUserLoginField, TradeField,
};
use crate::request::{InputOrderField, OrderActionField};

/// One callback from the gateway.
///
/// Query responses arrive as a sequence of events carrying the `request_id`
/// the query was sent with; the one with `is_last == true` is the terminal
/// record. A query with no rows produces a single terminal event with
/// `record == None`.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    FrontConnected,
    FrontDisconnected {
        reason: i32,
    },
    HeartBeatWarning {
        time_lapse: i32,
    },
    RspAuthenticate {
        rsp: RspInfo,
    },
    RspUserLogin {
        record: Option<RspUserLoginField>,
        rsp: RspInfo,
    },
    RspUserLogout {
        rsp: RspInfo,
    },
    RspOrderInsert {
        record: Option<InputOrderField>,
        rsp: RspInfo,
    },
    ErrRtnOrderInsert {
        record: Option<InputOrderField>,
        rsp: RspInfo,
    },
    RspOrderAction {
        record: Option<OrderActionField>,
        rsp: RspInfo,
    },
    ErrRtnOrderAction {
        record: Option<OrderActionField>,
        rsp: RspInfo,
    },
    RspQryInvestorAccount {
        record: Option<InvestorAccountField>,
        rsp: RspInfo,
        request_id: u32,
        is_last: bool,
    },
    RspQryInvestorPosition {
        record: Option<InvestorPositionField>,
        rsp: RspInfo,
        request_id: u32,
        is_last: bool,
    },
    RspQryOrder {
        record: Option<OrderField>,
        rsp: RspInfo,
        request_id: u32,
        is_last: bool,
    },
    RspQryTrade {
        record: Option<TradeField>,
        rsp: RspInfo,
        request_id: u32,
        is_last: bool,
    },
    RspQryInstrument {
        record: Option<InstrumentField>,
        rsp: RspInfo,
        request_id: u32,
        is_last: bool,
    },
    RtnOrder(OrderField),
    RtnTrade(TradeField),
    RtnInstrumentStatus(InstrumentStatusField),
}

impl GatewayEvent {
    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FrontConnected => "front_connected",
            Self::FrontDisconnected { .. } => "front_disconnected",
            Self::HeartBeatWarning { .. } => "heartbeat_warning",
            Self::RspAuthenticate { .. } => "rsp_authenticate",
            Self::RspUserLogin { .. } => "rsp_user_login",
            Self::RspUserLogout { .. } => "rsp_user_logout",
            Self::RspOrderInsert { .. } => "rsp_order_insert",
            Self::ErrRtnOrderInsert { .. } => "err_rtn_order_insert",
            Self::RspOrderAction { .. } => "rsp_order_action",
            Self::ErrRtnOrderAction { .. } => "err_rtn_order_action",
            Self::RspQryInvestorAccount { .. } => "rsp_qry_account",
            Self::RspQryInvestorPosition { .. } => "rsp_qry_position",
            Self::RspQryOrder { .. } => "rsp_qry_order",
            Self::RspQryTrade { .. } => "rsp_qry_trade",
            Self::RspQryInstrument { .. } => "rsp_qry_instrument",
            Self::RtnOrder(_) => "rtn_order",
            Self::RtnTrade(_) => "rtn_trade",
            Self::RtnInstrumentStatus(_) => "rtn_instrument_status",
        }
    }
}
