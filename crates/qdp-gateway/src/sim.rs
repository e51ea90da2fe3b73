//! In-process paper counterparty.
//!
//! Answers every request synchronously on the event channel: logins succeed
//! with a configured session, orders are acknowledged and optionally filled
//! in full, and queries return what has been traded so far.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::codes;
use crate::error::GatewayResult;
use crate::event::GatewayEvent;
use crate::fields::{
    InstrumentField, InvestorAccountField, InvestorPositionField, OrderField, RspInfo,
    RspUserLoginField, TradeField,
};
use crate::gateway::{EventSender, GatewayFactory, ResumeMode, TraderGateway};
use crate::request::{
    AuthenticateField, GatewayRequest, InputOrderField, OrderActionField, ReqUserLoginField,
};

/// Instrument served by the simulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimInstrument {
    pub code: String,
    pub exchange: String,
    pub num: i32,
    #[serde(default = "default_volume_multiple")]
    pub volume_multiple: i32,
}

fn default_volume_multiple() -> i32 {
    1
}

/// Simulator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default = "default_session_id")]
    pub session_id: u64,
    #[serde(default)]
    pub max_order_local_id: u32,
    /// `YYYYMMDD`; today when unset.
    #[serde(default)]
    pub trading_day: Option<String>,
    /// Required password; any password when unset.
    #[serde(default)]
    pub password: Option<String>,
    /// Required auth code; any code when unset.
    #[serde(default)]
    pub auth_code: Option<String>,
    #[serde(default = "default_fill_on_insert")]
    pub fill_on_insert: bool,
    #[serde(default = "default_balance")]
    pub balance: f64,
    #[serde(default)]
    pub instruments: Vec<SimInstrument>,
}

fn default_session_id() -> u64 {
    1
}

fn default_fill_on_insert() -> bool {
    true
}

fn default_balance() -> f64 {
    1_000_000.0
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            session_id: default_session_id(),
            max_order_local_id: 0,
            trading_day: None,
            password: None,
            auth_code: None,
            fill_on_insert: default_fill_on_insert(),
            balance: default_balance(),
            instruments: Vec::new(),
        }
    }
}

// Vendor error ids used by the simulator.
const ERR_INVALID_LOGIN: i32 = 3;
const ERR_INSTRUMENT_NOT_FOUND: i32 = 16;
const ERR_ORDER_NOT_FOUND: i32 = 25;
const ERR_BAD_VOLUME: i32 = 33;
const ERR_AUTH_FAILED: i32 = 63;

#[derive(Default)]
struct SimState {
    events: Option<EventSender>,
    orders: Vec<OrderField>,
    trades: Vec<TradeField>,
    /// (instrument, direction) -> (position, today position, cost)
    positions: HashMap<(String, char), (i32, i32, f64)>,
    next_sys_id: u64,
    next_trade_id: u64,
}

impl SimState {
    fn emit(&self, event: GatewayEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Paper gateway.
pub struct SimGateway {
    config: SimConfig,
    state: Mutex<SimState>,
}

impl SimGateway {
    pub fn new(config: SimConfig, events: EventSender) -> Self {
        let state = SimState {
            events: Some(events),
            ..SimState::default()
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    fn trading_day(&self) -> String {
        self.config
            .trading_day
            .clone()
            .unwrap_or_else(|| chrono::Local::now().format("%Y%m%d").to_string())
    }

    fn now_time() -> String {
        chrono::Local::now().format("%H:%M:%S").to_string()
    }

    fn instrument_by_num(&self, num: i32) -> Option<&SimInstrument> {
        self.config.instruments.iter().find(|i| i.num == num)
    }

    fn on_authenticate(&self, state: &SimState, req: &AuthenticateField) {
        let rsp = match &self.config.auth_code {
            Some(code) if *code != req.auth_code => RspInfo::error(ERR_AUTH_FAILED, "authentication failed"),
            _ => RspInfo::ok(),
        };
        state.emit(GatewayEvent::RspAuthenticate { rsp });
    }

    fn on_login(&self, state: &SimState, req: &ReqUserLoginField) {
        if let Some(password) = &self.config.password {
            if *password != req.password {
                state.emit(GatewayEvent::RspUserLogin {
                    record: None,
                    rsp: RspInfo::error(ERR_INVALID_LOGIN, "invalid user or password"),
                });
                return;
            }
        }

        let record = RspUserLoginField {
            broker_id: req.broker_id.clone(),
            user_id: req.user_id.clone(),
            session_id: self.config.session_id,
            max_order_local_id: self.config.max_order_local_id,
            trading_day: self.trading_day(),
        };
        info!(user = %req.user_id, session_id = record.session_id, "Sim login accepted");
        state.emit(GatewayEvent::RspUserLogin {
            record: Some(record),
            rsp: RspInfo::ok(),
        });
    }

    fn on_order_insert(&self, state: &mut SimState, req: &InputOrderField) {
        let Some(instrument) = self.instrument_by_num(req.instrument_id_num) else {
            state.emit(GatewayEvent::ErrRtnOrderInsert {
                record: Some(req.clone()),
                rsp: RspInfo::error(ERR_INSTRUMENT_NOT_FOUND, "instrument not found"),
            });
            return;
        };
        if req.volume <= 0 {
            state.emit(GatewayEvent::ErrRtnOrderInsert {
                record: Some(req.clone()),
                rsp: RspInfo::error(ERR_BAD_VOLUME, "invalid volume"),
            });
            return;
        }

        state.emit(GatewayEvent::RspOrderInsert {
            record: Some(req.clone()),
            rsp: RspInfo::ok(),
        });

        state.next_sys_id += 1;
        let mut order = OrderField {
            instrument_id: instrument.code.clone(),
            exchange_id: instrument.exchange.clone(),
            // Vendor pads order-system-ids to a fixed width.
            order_sys_id: format!("{:>12}", state.next_sys_id),
            user_order_local_id: req.user_order_local_id,
            direction: req.direction,
            offset_flag: req.offset_flag,
            hedge_flag: req.hedge_flag,
            order_price_type: req.order_price_type,
            limit_price: req.limit_price,
            volume: req.volume,
            volume_traded: 0,
            volume_remain: req.volume,
            time_condition: req.time_condition,
            volume_condition: req.volume_condition,
            insert_time: Self::now_time(),
            order_status: codes::OS_NO_TRADE_QUEUEING,
        };
        state.emit(GatewayEvent::RtnOrder(order.clone()));

        if self.config.fill_on_insert {
            order.volume_traded = order.volume;
            order.volume_remain = 0;
            order.order_status = codes::OS_ALL_TRADED;
            state.emit(GatewayEvent::RtnOrder(order.clone()));

            state.next_trade_id += 1;
            let trade = TradeField {
                trade_id: format!("{:>12}", state.next_trade_id),
                order_sys_id: order.order_sys_id.clone(),
                user_order_local_id: order.user_order_local_id,
                instrument_id: order.instrument_id.clone(),
                exchange_id: order.exchange_id.clone(),
                direction: order.direction,
                offset_flag: order.offset_flag,
                hedge_flag: order.hedge_flag,
                trade_price: order.limit_price,
                trade_volume: order.volume,
                trade_time: order.insert_time.clone(),
            };
            Self::apply_fill(state, &trade, instrument.volume_multiple);
            state.emit(GatewayEvent::RtnTrade(trade.clone()));
            state.trades.push(trade);
        } else if order.time_condition == codes::TC_IOC {
            order.order_status = codes::OS_CANCELED;
            state.emit(GatewayEvent::RtnOrder(order.clone()));
        }

        state.orders.push(order);
    }

    fn apply_fill(state: &mut SimState, trade: &TradeField, multiple: i32) {
        let opening = trade.offset_flag == codes::OF_OPEN;
        // Buy-open and sell-close touch the long side.
        let side = match (trade.direction, opening) {
            (codes::D_BUY, true) | (codes::D_SELL, false) => codes::D_BUY,
            _ => codes::D_SELL,
        };
        let entry = state
            .positions
            .entry((trade.instrument_id.clone(), side))
            .or_insert((0, 0, 0.0));

        let notional = trade.trade_price * f64::from(trade.trade_volume) * f64::from(multiple);
        if opening {
            entry.0 += trade.trade_volume;
            entry.1 += trade.trade_volume;
            entry.2 += notional;
        } else {
            let closed = trade.trade_volume.min(entry.0);
            if entry.0 > 0 {
                entry.2 -= entry.2 * f64::from(closed) / f64::from(entry.0);
            }
            entry.0 -= closed;
            entry.1 = entry.1.min(entry.0);
        }
    }

    fn on_order_action(&self, state: &mut SimState, req: &OrderActionField) {
        let sys_id = req.order_sys_id.trim();
        let found = state.orders.iter_mut().find(|o| {
            if sys_id.is_empty() {
                o.user_order_local_id == req.user_order_local_id
            } else {
                o.order_sys_id.trim() == sys_id
            }
        });

        match found {
            Some(order)
                if matches!(
                    order.order_status,
                    codes::OS_NO_TRADE_QUEUEING | codes::OS_PART_TRADED_QUEUEING
                ) =>
            {
                order.order_status = codes::OS_CANCELED;
                let pushed = order.clone();
                state.emit(GatewayEvent::RspOrderAction {
                    record: Some(req.clone()),
                    rsp: RspInfo::ok(),
                });
                state.emit(GatewayEvent::RtnOrder(pushed));
            }
            _ => state.emit(GatewayEvent::RspOrderAction {
                record: Some(req.clone()),
                rsp: RspInfo::error(ERR_ORDER_NOT_FOUND, "order not found or not cancelable"),
            }),
        }
    }

    /// Emit `rows` as one query response sequence.
    fn emit_rows<T, F>(state: &SimState, rows: Vec<T>, make: F)
    where
        F: Fn(Option<T>, bool) -> GatewayEvent,
    {
        if rows.is_empty() {
            state.emit(make(None, true));
            return;
        }
        let last = rows.len() - 1;
        for (i, row) in rows.into_iter().enumerate() {
            state.emit(make(Some(row), i == last));
        }
    }
}

impl TraderGateway for SimGateway {
    fn start(&self, front: &str, resume: ResumeMode) -> GatewayResult<()> {
        info!(front = %front, ?resume, "Sim gateway started");
        self.state.lock().emit(GatewayEvent::FrontConnected);
        Ok(())
    }

    fn send(&self, request: GatewayRequest, request_id: u32) -> i32 {
        let mut state = self.state.lock();
        if state.events.is_none() {
            return -1;
        }
        debug!(kind = request.kind(), request_id, "Sim request");

        match request {
            GatewayRequest::Authenticate(req) => self.on_authenticate(&state, &req),
            GatewayRequest::UserLogin(req) => self.on_login(&state, &req),
            GatewayRequest::UserLogout(_) => state.emit(GatewayEvent::RspUserLogout { rsp: RspInfo::ok() }),
            GatewayRequest::OrderInsert(req) => self.on_order_insert(&mut state, &req),
            GatewayRequest::OrderAction(req) => self.on_order_action(&mut state, &req),
            GatewayRequest::QryInvestorAccount(req) => {
                let account = InvestorAccountField {
                    investor_id: req.investor_id,
                    pre_balance: self.config.balance,
                    available: self.config.balance,
                    balance: self.config.balance,
                    ..InvestorAccountField::default()
                };
                state.emit(GatewayEvent::RspQryInvestorAccount {
                    record: Some(account),
                    rsp: RspInfo::ok(),
                    request_id,
                    is_last: true,
                });
            }
            GatewayRequest::QryInvestorPosition(_) => {
                let mut rows: Vec<InvestorPositionField> = state
                    .positions
                    .iter()
                    .filter(|(_, (pos, _, _))| *pos > 0)
                    .map(|((code, dir), (pos, today, cost))| InvestorPositionField {
                        instrument_id: code.clone(),
                        exchange_id: self
                            .config
                            .instruments
                            .iter()
                            .find(|i| i.code == *code)
                            .map(|i| i.exchange.clone())
                            .unwrap_or_default(),
                        direction: *dir,
                        hedge_flag: codes::CHF_SPECULATION,
                        position: *pos,
                        today_position: *today,
                        position_cost: *cost,
                        ..InvestorPositionField::default()
                    })
                    .collect();
                rows.sort_by(|a, b| (&a.instrument_id, a.direction).cmp(&(&b.instrument_id, b.direction)));
                Self::emit_rows(&state, rows, |record, is_last| GatewayEvent::RspQryInvestorPosition {
                    record,
                    rsp: RspInfo::ok(),
                    request_id,
                    is_last,
                });
            }
            GatewayRequest::QryOrder(_) => {
                let rows = state.orders.clone();
                Self::emit_rows(&state, rows, |record, is_last| GatewayEvent::RspQryOrder {
                    record,
                    rsp: RspInfo::ok(),
                    request_id,
                    is_last,
                });
            }
            GatewayRequest::QryTrade(_) => {
                let rows = state.trades.clone();
                Self::emit_rows(&state, rows, |record, is_last| GatewayEvent::RspQryTrade {
                    record,
                    rsp: RspInfo::ok(),
                    request_id,
                    is_last,
                });
            }
            GatewayRequest::QryInstrument(_) => {
                let rows: Vec<InstrumentField> = self
                    .config
                    .instruments
                    .iter()
                    .map(|i| InstrumentField {
                        instrument_id: i.code.clone(),
                        exchange_id: i.exchange.clone(),
                        instrument_id_num: i.num,
                        volume_multiple: i.volume_multiple,
                    })
                    .collect();
                Self::emit_rows(&state, rows, |record, is_last| GatewayEvent::RspQryInstrument {
                    record,
                    rsp: RspInfo::ok(),
                    request_id,
                    is_last,
                });
            }
            GatewayRequest::Ready(flow) => debug!(series = ?flow.series, "Sim stream ready"),
        }
        0
    }

    fn release(&self) {
        self.state.lock().events.take();
    }
}

/// Factory for [`SimGateway`], registered as `"sim"`.
pub struct SimFactory {
    config: SimConfig,
}

impl SimFactory {
    pub fn new(config: SimConfig) -> Self {
        Self { config }
    }
}

impl GatewayFactory for SimFactory {
    fn name(&self) -> &str {
        "sim"
    }

    fn create(&self, flow_path: &Path, events: EventSender) -> GatewayResult<Arc<dyn TraderGateway>> {
        std::fs::create_dir_all(flow_path)?;
        let gateway: Arc<dyn TraderGateway> = Arc::new(SimGateway::new(self.config.clone(), events));
        Ok(gateway)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{event_channel, EventReceiver};
    use crate::request::QryField;

    fn config() -> SimConfig {
        SimConfig {
            session_id: 7,
            max_order_local_id: 40,
            trading_day: Some("20240315".to_string()),
            password: Some("secret".to_string()),
            instruments: vec![SimInstrument {
                code: "cu2405".to_string(),
                exchange: "SHFE".to_string(),
                num: 11,
                volume_multiple: 5,
            }],
            ..SimConfig::default()
        }
    }

    fn drain(rx: &mut EventReceiver) -> Vec<GatewayEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn order(num: i32, local_id: u32) -> InputOrderField {
        InputOrderField {
            instrument_id: "cu2405".to_string(),
            instrument_id_num: num,
            user_order_local_id: local_id,
            direction: codes::D_BUY,
            offset_flag: codes::OF_OPEN,
            order_price_type: codes::OPT_LIMIT_PRICE,
            limit_price: 70000.0,
            volume: 2,
            time_condition: codes::TC_GFD,
            volume_condition: codes::VC_AV,
            ..InputOrderField::default()
        }
    }

    #[test]
    fn test_login_checks_password() {
        let (tx, mut rx) = event_channel();
        let gw = SimGateway::new(config(), tx);

        gw.send(
            GatewayRequest::UserLogin(ReqUserLoginField {
                password: "wrong".to_string(),
                ..ReqUserLoginField::default()
            }),
            1,
        );
        match drain(&mut rx).as_slice() {
            [GatewayEvent::RspUserLogin { record: None, rsp }] => assert!(rsp.is_error()),
            other => panic!("unexpected events: {other:?}"),
        }

        gw.send(
            GatewayRequest::UserLogin(ReqUserLoginField {
                password: "secret".to_string(),
                ..ReqUserLoginField::default()
            }),
            2,
        );
        match drain(&mut rx).as_slice() {
            [GatewayEvent::RspUserLogin { record: Some(r), rsp }] => {
                assert!(!rsp.is_error());
                assert_eq!(r.session_id, 7);
                assert_eq!(r.max_order_local_id, 40);
                assert_eq!(r.trading_day, "20240315");
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_order_fill_and_queries() {
        let (tx, mut rx) = event_channel();
        let gw = SimGateway::new(config(), tx);

        assert_eq!(gw.send(GatewayRequest::OrderInsert(order(11, 41)), 3), 0);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], GatewayEvent::RspOrderInsert { .. }));
        match (&events[2], &events[3]) {
            (GatewayEvent::RtnOrder(o), GatewayEvent::RtnTrade(t)) => {
                assert_eq!(o.order_status, codes::OS_ALL_TRADED);
                assert_eq!(o.order_sys_id.trim(), "1");
                assert_eq!(t.order_sys_id, o.order_sys_id);
                assert_eq!(t.trade_volume, 2);
            }
            other => panic!("unexpected events: {other:?}"),
        }

        gw.send(GatewayRequest::QryInvestorPosition(QryField::default()), 4);
        match drain(&mut rx).as_slice() {
            [GatewayEvent::RspQryInvestorPosition { record: Some(p), request_id: 4, is_last: true, .. }] => {
                assert_eq!(p.direction, codes::D_BUY);
                assert_eq!(p.position, 2);
                assert_eq!(p.today_position, 2);
                assert_eq!(p.position_cost, 700_000.0);
            }
            other => panic!("unexpected events: {other:?}"),
        }

        gw.send(GatewayRequest::QryTrade(QryField::default()), 5);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_unknown_instrument_rejected() {
        let (tx, mut rx) = event_channel();
        let gw = SimGateway::new(config(), tx);

        gw.send(GatewayRequest::OrderInsert(order(99, 41)), 3);
        match drain(&mut rx).as_slice() {
            [GatewayEvent::ErrRtnOrderInsert { rsp, .. }] => {
                assert_eq!(rsp.error_id, ERR_INSTRUMENT_NOT_FOUND);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_cancel_resting_order() {
        let (tx, mut rx) = event_channel();
        let gw = SimGateway::new(
            SimConfig {
                fill_on_insert: false,
                ..config()
            },
            tx,
        );

        gw.send(GatewayRequest::OrderInsert(order(11, 41)), 3);
        drain(&mut rx);

        let action = OrderActionField {
            order_sys_id: "1".to_string(),
            user_order_local_id: 41,
            action_flag: codes::AF_DELETE,
            ..OrderActionField::default()
        };
        gw.send(GatewayRequest::OrderAction(action.clone()), 4);
        match drain(&mut rx).as_slice() {
            [GatewayEvent::RspOrderAction { rsp, .. }, GatewayEvent::RtnOrder(o)] => {
                assert!(!rsp.is_error());
                assert_eq!(o.order_status, codes::OS_CANCELED);
            }
            other => panic!("unexpected events: {other:?}"),
        }

        // Second cancel fails.
        gw.send(GatewayRequest::OrderAction(action), 5);
        match drain(&mut rx).as_slice() {
            [GatewayEvent::RspOrderAction { rsp, .. }] => assert_eq!(rsp.error_id, ERR_ORDER_NOT_FOUND),
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_empty_query_sends_terminal_record() {
        let (tx, mut rx) = event_channel();
        let gw = SimGateway::new(config(), tx);

        gw.send(GatewayRequest::QryOrder(QryField::default()), 1);
        assert_eq!(
            drain(&mut rx),
            vec![GatewayEvent::RspQryOrder {
                record: None,
                rsp: RspInfo::ok(),
                request_id: 1,
                is_last: true,
            }]
        );
    }

    #[test]
    fn test_release_stops_events() {
        let (tx, mut rx) = event_channel();
        let gw = SimGateway::new(config(), tx);
        gw.release();
        assert_eq!(gw.send(GatewayRequest::QryOrder(QryField::default()), 1), -1);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_factory_creates_flow_dir() {
        let dir = tempfile::tempdir().unwrap();
        let flow_path = dir.path().join("flows").join("9999").join("u1");
        let (tx, mut rx) = event_channel();

        let gw = SimFactory::new(config()).create(&flow_path, tx).unwrap();
        assert!(flow_path.is_dir());

        tokio_test::assert_ok!(gw.start("tcp://sim:1", ResumeMode::Resume));
        assert_eq!(drain(&mut rx), vec![GatewayEvent::FrontConnected]);
    }
}
