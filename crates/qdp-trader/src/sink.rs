//! Host callback surface.
//!
//! The session never holds its own locks while invoking a sink method, so
//! implementations may call back into the session.

use parking_lot::Mutex;
use qdp_core::{
    CanonicalAccount, CanonicalOrder, CanonicalPosition, CanonicalTrade, Entrust, TradeStatus,
};

use crate::error::TraderError;

/// Connection lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraderEvent {
    Connect,
    Close { reason: i32 },
    Logout,
}

/// Receiver of everything the session reports upward.
///
/// All methods default to no-ops so hosts implement only what they need.
pub trait TraderSink: Send + Sync {
    /// `trading_date` is `YYYYMMDD`, 0 on failure.
    fn on_login_result(&self, _success: bool, _message: &str, _trading_date: u32) {}

    fn handle_event(&self, _event: TraderEvent) {}

    /// Acknowledgement of a submitted order. `error` is `None` on acceptance.
    fn on_rsp_entrust(&self, _entrust: &Entrust, _error: Option<&TraderError>) {}

    fn on_rsp_account(&self, _accounts: &[CanonicalAccount]) {}

    fn on_rsp_positions(&self, _positions: &[CanonicalPosition]) {}

    fn on_rsp_orders(&self, _orders: &[CanonicalOrder]) {}

    fn on_rsp_trades(&self, _trades: &[CanonicalTrade]) {}

    fn on_push_order(&self, _order: &CanonicalOrder) {}

    fn on_push_trade(&self, _trade: &CanonicalTrade) {}

    fn on_push_instrument_status(&self, _exchange: &str, _code: &str, _status: TradeStatus) {}

    fn on_trader_error(&self, _error: &TraderError) {}
}

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkRecord {
    Login {
        success: bool,
        message: String,
        trading_date: u32,
    },
    Event(TraderEvent),
    Entrust {
        entrust: Entrust,
        error: Option<TraderError>,
    },
    Accounts(Vec<CanonicalAccount>),
    Positions(Vec<CanonicalPosition>),
    Orders(Vec<CanonicalOrder>),
    Trades(Vec<CanonicalTrade>),
    PushOrder(CanonicalOrder),
    PushTrade(CanonicalTrade),
    InstrumentStatus {
        exchange: String,
        code: String,
        status: TradeStatus,
    },
    Error(TraderError),
}

/// Sink that records every call in order. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<SinkRecord>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().clone()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn push_orders(&self) -> Vec<CanonicalOrder> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| match r {
                SinkRecord::PushOrder(o) => Some(o.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn push_trades(&self) -> Vec<CanonicalTrade> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| match r {
                SinkRecord::PushTrade(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<TraderError> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| match r {
                SinkRecord::Error(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, record: SinkRecord) {
        self.records.lock().push(record);
    }
}

impl TraderSink for CollectingSink {
    fn on_login_result(&self, success: bool, message: &str, trading_date: u32) {
        self.push(SinkRecord::Login {
            success,
            message: message.to_string(),
            trading_date,
        });
    }

    fn handle_event(&self, event: TraderEvent) {
        self.push(SinkRecord::Event(event));
    }

    fn on_rsp_entrust(&self, entrust: &Entrust, error: Option<&TraderError>) {
        self.push(SinkRecord::Entrust {
            entrust: entrust.clone(),
            error: error.cloned(),
        });
    }

    fn on_rsp_account(&self, accounts: &[CanonicalAccount]) {
        self.push(SinkRecord::Accounts(accounts.to_vec()));
    }

    fn on_rsp_positions(&self, positions: &[CanonicalPosition]) {
        self.push(SinkRecord::Positions(positions.to_vec()));
    }

    fn on_rsp_orders(&self, orders: &[CanonicalOrder]) {
        self.push(SinkRecord::Orders(orders.to_vec()));
    }

    fn on_rsp_trades(&self, trades: &[CanonicalTrade]) {
        self.push(SinkRecord::Trades(trades.to_vec()));
    }

    fn on_push_order(&self, order: &CanonicalOrder) {
        self.push(SinkRecord::PushOrder(order.clone()));
    }

    fn on_push_trade(&self, trade: &CanonicalTrade) {
        self.push(SinkRecord::PushTrade(trade.clone()));
    }

    fn on_push_instrument_status(&self, exchange: &str, code: &str, status: TradeStatus) {
        self.push(SinkRecord::InstrumentStatus {
            exchange: exchange.to_string(),
            code: code.to_string(),
            status,
        });
    }

    fn on_trader_error(&self, error: &TraderError) {
        self.push(SinkRecord::Error(error.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;
    impl TraderSink for Silent {}

    #[test]
    fn test_default_methods_are_noops() {
        let sink = Silent;
        sink.handle_event(TraderEvent::Connect);
        sink.on_trader_error(&TraderError::Transport);
    }

    #[test]
    fn test_collecting_sink_keeps_order() {
        let sink = CollectingSink::new();
        sink.handle_event(TraderEvent::Connect);
        sink.on_login_result(true, "", 20240102);
        sink.on_trader_error(&TraderError::LoginInProgress);

        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], SinkRecord::Event(TraderEvent::Connect));
        assert!(matches!(
            records[1],
            SinkRecord::Login { success: true, trading_date: 20240102, .. }
        ));
        assert_eq!(sink.errors(), vec![TraderError::LoginInProgress]);

        sink.clear();
        assert!(sink.is_empty());
    }
}
