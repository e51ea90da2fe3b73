//! Gateway boundary for the QDP trading channel.
//!
//! The session engine never talks to a vendor library directly. It holds a
//! [`TraderGateway`] created by a [`GatewayFactory`] looked up by name in a
//! [`GatewayRegistry`], sends [`GatewayRequest`]s through it, and receives
//! vendor callbacks as [`GatewayEvent`]s on a channel.
//!
//! Adapters provided here:
//! - `SimGateway`: in-process paper counterparty (`"sim"`)
//! - `RecordingGateway`: records requests for inspection in tests

pub mod codes;
pub mod error;
pub mod event;
pub mod fields;
pub mod gateway;
pub mod recording;
pub mod registry;
pub mod request;
pub mod sim;

pub use error::{GatewayError, GatewayResult};
pub use event::GatewayEvent;
pub use fields::{
    InstrumentField, InstrumentStatusField, InvestorAccountField, InvestorPositionField,
    OrderField, RspInfo, RspUserLoginField, TradeField,
};
pub use gateway::{
    event_channel, EventReceiver, EventSender, FlowSeries, GatewayFactory, ResumeMode,
    TraderGateway,
};
pub use recording::{RecordingFactory, RecordingGateway};
pub use registry::GatewayRegistry;
pub use request::{
    AuthenticateField, FlowStatusField, GatewayRequest, InputOrderField, OrderActionField,
    QryField, QryInstrumentField, ReqUserLoginField, ReqUserLogoutField,
};
pub use sim::{SimConfig, SimFactory, SimGateway, SimInstrument};
