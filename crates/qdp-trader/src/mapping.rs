//! Vendor code tables.
//!
//! Every `from_vendor_*` function has a fallback for codes outside the
//! table: offset → `Open`, price type → `Limit`, time condition → `Gfd`,
//! order state → `Submitting`, order flag → `Normal`, instrument status →
//! `NoTrading`.

use qdp_core::{Direction, OffsetType, OrderFlag, OrderState, PriceType, TimeCondition, TradeStatus};
use qdp_gateway::codes;

/// Vendor buy/sell from position direction and offset.
///
/// Opening a long or closing a short is a buy.
#[must_use]
pub fn to_vendor_direction(direction: Direction, offset: OffsetType) -> char {
    match (direction, offset.is_close()) {
        (Direction::Long, false) | (Direction::Short, true) => codes::D_BUY,
        (Direction::Long, true) | (Direction::Short, false) => codes::D_SELL,
    }
}

/// Position direction from vendor buy/sell and offset.
#[must_use]
pub fn from_vendor_direction(direction: char, offset: char) -> Direction {
    let opening = offset == codes::OF_OPEN;
    match (direction == codes::D_BUY, opening) {
        (true, true) | (false, false) => Direction::Long,
        (true, false) | (false, true) => Direction::Short,
    }
}

/// Direction of a position record (buy side is long).
#[must_use]
pub fn from_vendor_position_direction(direction: char) -> Direction {
    if direction == codes::D_BUY {
        Direction::Long
    } else {
        Direction::Short
    }
}

#[must_use]
pub fn to_vendor_offset(offset: OffsetType) -> char {
    match offset {
        OffsetType::Open => codes::OF_OPEN,
        OffsetType::Close => codes::OF_CLOSE,
        OffsetType::CloseToday => codes::OF_CLOSE_TODAY,
        OffsetType::CloseYesterday => codes::OF_CLOSE_YESTERDAY,
    }
}

#[must_use]
pub fn from_vendor_offset(offset: char) -> OffsetType {
    match offset {
        codes::OF_CLOSE | codes::OF_FORCE_CLOSE => OffsetType::Close,
        codes::OF_CLOSE_TODAY => OffsetType::CloseToday,
        codes::OF_CLOSE_YESTERDAY => OffsetType::CloseYesterday,
        _ => OffsetType::Open,
    }
}

#[must_use]
pub fn to_vendor_price_type(price_type: PriceType) -> char {
    match price_type {
        PriceType::AnyPrice => codes::OPT_ANY_PRICE,
        PriceType::Limit => codes::OPT_LIMIT_PRICE,
        PriceType::Best => codes::OPT_BEST_PRICE,
    }
}

#[must_use]
pub fn from_vendor_price_type(price_type: char) -> PriceType {
    match price_type {
        codes::OPT_ANY_PRICE => PriceType::AnyPrice,
        codes::OPT_BEST_PRICE => PriceType::Best,
        _ => PriceType::Limit,
    }
}

#[must_use]
pub fn to_vendor_time_condition(tc: TimeCondition) -> char {
    match tc {
        TimeCondition::Ioc => codes::TC_IOC,
        TimeCondition::Gfd => codes::TC_GFD,
    }
}

#[must_use]
pub fn from_vendor_time_condition(tc: char) -> TimeCondition {
    if tc == codes::TC_IOC {
        TimeCondition::Ioc
    } else {
        TimeCondition::Gfd
    }
}

/// `(time condition, volume condition)` for an order flag.
#[must_use]
pub fn to_vendor_order_flag(flag: OrderFlag) -> (char, char) {
    match flag {
        OrderFlag::Normal => (codes::TC_GFD, codes::VC_AV),
        OrderFlag::Fak => (codes::TC_IOC, codes::VC_AV),
        OrderFlag::Fok => (codes::TC_IOC, codes::VC_CV),
    }
}

/// Order flag from time and volume condition.
///
/// IOC with any-volume or minimum-volume is FAK, IOC with complete-volume
/// is FOK, everything else is a normal day order.
#[must_use]
pub fn from_vendor_order_flag(tc: char, vc: char) -> OrderFlag {
    if tc != codes::TC_IOC {
        return OrderFlag::Normal;
    }
    match vc {
        codes::VC_AV | codes::VC_MV => OrderFlag::Fak,
        _ => OrderFlag::Fok,
    }
}

#[must_use]
pub fn from_vendor_order_state(status: char) -> OrderState {
    match status {
        codes::OS_ALL_TRADED => OrderState::AllTraded,
        codes::OS_PART_TRADED_QUEUEING => OrderState::PartTradedQueuing,
        codes::OS_PART_TRADED_NOT_QUEUEING => OrderState::PartTradedNotQueuing,
        codes::OS_NO_TRADE_QUEUEING => OrderState::NotTradedQueuing,
        codes::OS_NO_TRADE_NOT_QUEUEING => OrderState::NotTradedNotQueuing,
        codes::OS_CANCELED => OrderState::Canceled,
        _ => OrderState::Submitting,
    }
}

#[must_use]
pub fn from_vendor_trade_status(status: char) -> TradeStatus {
    match status {
        codes::IS_BEFORE_TRADING => TradeStatus::BeforeTrading,
        codes::IS_CONTINOUS => TradeStatus::Continuous,
        codes::IS_AUCTION_ORDERING => TradeStatus::AuctionOrdering,
        codes::IS_AUCTION_BALANCE => TradeStatus::AuctionBalance,
        codes::IS_AUCTION_MATCH => TradeStatus::AuctionMatch,
        codes::IS_CLOSED => TradeStatus::Closed,
        _ => TradeStatus::NoTrading,
    }
}
