//! Gateway records to canonical records.
//!
//! Every function is pure over a [`TranslateContext`] apart from the
//! order-id bridge put in [`make_order`]. A record whose contract is unknown
//! to the lookup is dropped and `None` is returned.

use qdp_cache::TagCache;
use qdp_core::{
    make_time, to_decimal, CanonicalAccount, CanonicalOrder, CanonicalPosition, CanonicalTrade,
    Entrust, EntrustId,
};
use qdp_gateway::{
    InputOrderField, InvestorAccountField, InvestorPositionField, OrderField, RspInfo, TradeField,
};
use qdp_telemetry::Metrics;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::contracts::ContractLookup;
use crate::error::TraderError;
use crate::mapping::{
    from_vendor_direction, from_vendor_offset, from_vendor_order_flag, from_vendor_order_state,
    from_vendor_position_direction, from_vendor_price_type,
};

/// Session facts and lookups needed to build canonical records.
pub struct TranslateContext<'a> {
    pub session_id: u64,
    pub trading_date: u32,
    pub contracts: &'a dyn ContractLookup,
    /// EntrustId -> user tag.
    pub eid_cache: &'a TagCache,
    /// Order-system-id -> user tag.
    pub oid_cache: &'a TagCache,
}

pub(crate) fn log_cache_warning(message: &str) {
    warn!("{message}");
}

fn volume(v: i32) -> u32 {
    u32::try_from(v).unwrap_or(0)
}

fn dropped(record: &'static str, code: &str, exchange: &str) {
    debug!(record, code, exchange, "Contract not found, record dropped");
    Metrics::record_dropped(record);
}

/// Order push or order query row.
pub fn make_order(ctx: &TranslateContext<'_>, field: &OrderField) -> Option<CanonicalOrder> {
    let Some(contract) = ctx.contracts.get_contract(&field.instrument_id, None) else {
        dropped("order", &field.instrument_id, &field.exchange_id);
        return None;
    };

    let entrust_id = match EntrustId::encode(ctx.session_id, field.user_order_local_id) {
        Ok(id) => id,
        Err(e) => {
            warn!(local_id = field.user_order_local_id, error = %e, "Order with unencodable id dropped");
            Metrics::record_dropped("order");
            return None;
        }
    };

    let order_id = field.order_sys_id.trim();
    let user_tag = match ctx.eid_cache.get(entrust_id.as_str()) {
        Some(tag) => {
            // First sighting of the system id: bridge the tag for trades.
            if !order_id.is_empty() && ctx.oid_cache.get(order_id).is_none() {
                ctx.oid_cache.put(order_id, &tag, 0, log_cache_warning);
            }
            tag
        }
        None => entrust_id.to_string(),
    };

    Some(CanonicalOrder {
        code: contract.code.clone(),
        exchange: contract.exchange.clone(),
        contract,
        price: to_decimal(field.limit_price),
        volume: volume(field.volume),
        direction: from_vendor_direction(field.direction, field.offset_flag),
        offset: from_vendor_offset(field.offset_flag),
        price_type: from_vendor_price_type(field.order_price_type),
        order_flag: from_vendor_order_flag(field.time_condition, field.volume_condition),
        traded: volume(field.volume_traded),
        left: volume(field.volume_remain),
        order_date: ctx.trading_date,
        order_time: make_time(ctx.trading_date, &field.insert_time),
        state: from_vendor_order_state(field.order_status),
        entrust_id,
        order_id: field.order_sys_id.clone(),
        user_tag,
    })
}

/// Order-insert echo back to the submitted entrust.
pub fn make_entrust(ctx: &TranslateContext<'_>, field: &InputOrderField) -> Option<Entrust> {
    let Some(contract) = ctx.contracts.get_contract(&field.instrument_id, None) else {
        dropped("entrust", &field.instrument_id, &field.exchange_id);
        return None;
    };

    let entrust_id = EntrustId::encode(ctx.session_id, field.user_order_local_id).ok();
    let user_tag = entrust_id
        .as_ref()
        .and_then(|id| ctx.eid_cache.get(id.as_str()));

    Some(Entrust {
        code: contract.code,
        exchange: contract.exchange,
        price: to_decimal(field.limit_price),
        volume: volume(field.volume),
        direction: from_vendor_direction(field.direction, field.offset_flag),
        offset: from_vendor_offset(field.offset_flag),
        price_type: from_vendor_price_type(field.order_price_type),
        order_flag: from_vendor_order_flag(field.time_condition, field.volume_condition),
        entrust_id,
        user_tag,
    })
}

/// Trade push or trade query row.
pub fn make_trade(ctx: &TranslateContext<'_>, field: &TradeField) -> Option<CanonicalTrade> {
    let Some(contract) = ctx
        .contracts
        .get_contract(&field.instrument_id, Some(&field.exchange_id))
    else {
        dropped("trade", &field.instrument_id, &field.exchange_id);
        return None;
    };

    let price = to_decimal(field.trade_price);
    let volume = volume(field.trade_volume);
    let amount = Decimal::from(contract.vol_scale) * Decimal::from(volume) * price;
    let ref_order = field.order_sys_id.trim();

    Some(CanonicalTrade {
        code: contract.code.clone(),
        exchange: contract.exchange.clone(),
        contract,
        trade_id: field.trade_id.trim().to_string(),
        price,
        volume,
        direction: from_vendor_direction(field.direction, field.offset_flag),
        offset: from_vendor_offset(field.offset_flag),
        trade_date: ctx.trading_date,
        trade_time: make_time(ctx.trading_date, &field.trade_time),
        ref_order: ref_order.to_string(),
        amount,
        user_tag: ctx.oid_cache.get(ref_order),
    })
}

#[must_use]
pub fn make_account(field: &InvestorAccountField) -> CanonicalAccount {
    CanonicalAccount {
        pre_balance: to_decimal(field.pre_balance),
        close_profit: to_decimal(field.close_profit),
        dyn_profit: to_decimal(field.position_profit),
        margin: to_decimal(field.margin),
        available: to_decimal(field.available),
        commission: to_decimal(field.fee),
        frozen_margin: to_decimal(field.frozen_margin),
        frozen_commission: to_decimal(field.frozen_fee),
        deposit: to_decimal(field.deposit),
        withdraw: to_decimal(field.withdraw),
        balance: to_decimal(field.balance),
        currency: "CNY".to_string(),
    }
}

/// Position query row. Carried-over volume is the total less today's.
pub fn make_position(
    ctx: &TranslateContext<'_>,
    field: &InvestorPositionField,
) -> Option<CanonicalPosition> {
    let Some(contract) = ctx.contracts.get_contract(&field.instrument_id, None) else {
        dropped("position", &field.instrument_id, &field.exchange_id);
        return None;
    };

    let total = volume(field.position);
    let new_position = volume(field.today_position).min(total);
    let position_cost = to_decimal(field.position_cost);
    let avg_price = if total == 0 || contract.vol_scale == 0 {
        Decimal::ZERO
    } else {
        position_cost
            .checked_div(Decimal::from(total))
            .and_then(|p| p.checked_div(Decimal::from(contract.vol_scale)))
            .unwrap_or_default()
    };

    Some(CanonicalPosition {
        code: contract.code.clone(),
        exchange: contract.exchange.clone(),
        currency: contract.currency.clone(),
        contract,
        direction: from_vendor_position_direction(field.direction),
        new_position,
        pre_position: total - new_position,
        margin: to_decimal(field.used_margin),
        dyn_profit: to_decimal(field.position_profit),
        position_cost,
        avg_price,
    })
}

/// Business error carried by a gateway response.
#[must_use]
pub fn make_error(rsp: &RspInfo) -> TraderError {
    TraderError::Business {
        code: rsp.error_id,
        message: rsp.error_msg.clone(),
    }
}
