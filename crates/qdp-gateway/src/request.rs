//! Requests sent through a [`TraderGateway`](crate::TraderGateway).

use serde::{Deserialize, Serialize};

use crate::gateway::FlowSeries;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateField {
    pub broker_id: String,
    pub user_id: String,
    pub app_id: String,
    pub auth_code: String,
    pub user_product_info: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReqUserLoginField {
    pub broker_id: String,
    pub user_id: String,
    pub password: String,
    pub user_product_info: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReqUserLogoutField {
    pub broker_id: String,
    pub user_id: String,
}

/// Order insert request. Also echoed back in the insert response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputOrderField {
    pub broker_id: String,
    pub user_id: String,
    pub investor_id: String,
    pub investor_id_num: i32,
    pub instrument_id: String,
    pub instrument_id_num: i32,
    pub exchange_id: String,
    pub user_order_local_id: u32,
    pub order_price_type: char,
    pub direction: char,
    pub offset_flag: char,
    pub hedge_flag: char,
    pub limit_price: f64,
    pub volume: i32,
    pub time_condition: char,
    pub volume_condition: char,
}

/// Cancel request. Also echoed back in the cancel response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderActionField {
    pub broker_id: String,
    pub user_id: String,
    pub investor_id: String,
    pub exchange_id: String,
    pub order_sys_id: String,
    pub user_order_local_id: u32,
    pub action_flag: char,
}

/// Account, position, order and trade queries share this shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QryField {
    pub broker_id: String,
    pub user_id: String,
    pub investor_id: String,
}

/// Empty fields query every instrument.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QryInstrumentField {
    pub exchange_id: String,
    pub instrument_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStatusField {
    pub series: FlowSeries,
    pub ready: bool,
}

/// Every request the session engine can issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GatewayRequest {
    Authenticate(AuthenticateField),
    UserLogin(ReqUserLoginField),
    UserLogout(ReqUserLogoutField),
    OrderInsert(InputOrderField),
    OrderAction(OrderActionField),
    QryInvestorAccount(QryField),
    QryInvestorPosition(QryField),
    QryOrder(QryField),
    QryTrade(QryField),
    QryInstrument(QryInstrumentField),
    Ready(FlowStatusField),
}

impl GatewayRequest {
    /// Short name for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authenticate(_) => "authenticate",
            Self::UserLogin(_) => "user_login",
            Self::UserLogout(_) => "user_logout",
            Self::OrderInsert(_) => "order_insert",
            Self::OrderAction(_) => "order_action",
            Self::QryInvestorAccount(_) => "qry_account",
            Self::QryInvestorPosition(_) => "qry_position",
            Self::QryOrder(_) => "qry_order",
            Self::QryTrade(_) => "qry_trade",
            Self::QryInstrument(_) => "qry_instrument",
            Self::Ready(_) => "ready",
        }
    }

    /// Returns true for the throttled query requests.
    #[must_use]
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Self::QryInvestorAccount(_) | Self::QryInvestorPosition(_) | Self::QryOrder(_) | Self::QryTrade(_)
        )
    }
}
