//! Sink that writes every session callback to the log.

use qdp_core::{
    CanonicalAccount, CanonicalOrder, CanonicalPosition, CanonicalTrade, Entrust, TradeStatus,
};
use qdp_trader::{TraderError, TraderEvent, TraderSink};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct LoggingSink;

impl TraderSink for LoggingSink {
    fn on_login_result(&self, success: bool, message: &str, trading_date: u32) {
        if success {
            info!(trading_date, "Login succeeded");
        } else {
            warn!(message, "Login failed");
        }
    }

    fn handle_event(&self, event: TraderEvent) {
        info!(?event, "Session event");
    }

    fn on_rsp_entrust(&self, entrust: &Entrust, error: Option<&TraderError>) {
        match error {
            None => info!(
                code = %entrust.code,
                entrust_id = ?entrust.entrust_id,
                tag = ?entrust.user_tag,
                "Order accepted"
            ),
            Some(e) => warn!(code = %entrust.code, entrust_id = ?entrust.entrust_id, error = %e, "Order rejected"),
        }
    }

    fn on_rsp_account(&self, accounts: &[CanonicalAccount]) {
        for a in accounts {
            info!(
                balance = %a.balance,
                available = %a.available,
                margin = %a.margin,
                dyn_profit = %a.dyn_profit,
                currency = %a.currency,
                "Account"
            );
        }
    }

    fn on_rsp_positions(&self, positions: &[CanonicalPosition]) {
        info!(count = positions.len(), "Positions");
        for p in positions {
            info!(
                code = %p.code,
                direction = %p.direction,
                pre = p.pre_position,
                new = p.new_position,
                avg_price = %p.avg_price,
                "Position"
            );
        }
    }

    fn on_rsp_orders(&self, orders: &[CanonicalOrder]) {
        let alive = orders.iter().filter(|o| o.state.is_alive()).count();
        info!(count = orders.len(), alive, "Orders");
    }

    fn on_rsp_trades(&self, trades: &[CanonicalTrade]) {
        info!(count = trades.len(), "Trades");
    }

    fn on_push_order(&self, order: &CanonicalOrder) {
        info!(
            entrust_id = %order.entrust_id,
            order_id = %order.order_id.trim(),
            state = ?order.state,
            traded = order.traded,
            left = order.left,
            tag = %order.user_tag,
            "Order update"
        );
    }

    fn on_push_trade(&self, trade: &CanonicalTrade) {
        info!(
            code = %trade.code,
            trade_id = %trade.trade_id,
            price = %trade.price,
            volume = trade.volume,
            amount = %trade.amount,
            tag = ?trade.user_tag,
            "Trade"
        );
    }

    fn on_push_instrument_status(&self, exchange: &str, code: &str, status: TradeStatus) {
        info!(exchange, code, ?status, "Instrument status");
    }

    fn on_trader_error(&self, error: &TraderError) {
        warn!(code = error.code(), error = %error, "Trader error");
    }
}
