//! Single-character vendor codes carried in request and record fields.

// Direction
pub const D_BUY: char = '0';
pub const D_SELL: char = '1';

// Offset flag
pub const OF_OPEN: char = '0';
pub const OF_CLOSE: char = '1';
pub const OF_FORCE_CLOSE: char = '2';
pub const OF_CLOSE_TODAY: char = '3';
pub const OF_CLOSE_YESTERDAY: char = '4';

// Order price type
pub const OPT_ANY_PRICE: char = '1';
pub const OPT_LIMIT_PRICE: char = '2';
pub const OPT_BEST_PRICE: char = '3';

// Time condition
pub const TC_IOC: char = '1';
pub const TC_GFS: char = '2';
pub const TC_GFD: char = '3';
pub const TC_GTD: char = '4';
pub const TC_GTC: char = '5';

// Volume condition
pub const VC_AV: char = '1';
pub const VC_MV: char = '2';
pub const VC_CV: char = '3';

// Order status
pub const OS_ALL_TRADED: char = '0';
pub const OS_PART_TRADED_QUEUEING: char = '1';
pub const OS_PART_TRADED_NOT_QUEUEING: char = '2';
pub const OS_NO_TRADE_QUEUEING: char = '3';
pub const OS_NO_TRADE_NOT_QUEUEING: char = '4';
pub const OS_CANCELED: char = '5';

// Hedge flag
pub const CHF_SPECULATION: char = '1';
pub const CHF_ARBITRAGE: char = '2';
pub const CHF_HEDGE: char = '3';

// Action flag
pub const AF_DELETE: char = '0';
pub const AF_SUSPEND: char = '1';
pub const AF_ACTIVE: char = '2';
pub const AF_MODIFY: char = '3';

// Instrument status
pub const IS_BEFORE_TRADING: char = '0';
pub const IS_NO_TRADING: char = '1';
pub const IS_CONTINOUS: char = '2';
pub const IS_AUCTION_ORDERING: char = '3';
pub const IS_AUCTION_BALANCE: char = '4';
pub const IS_AUCTION_MATCH: char = '5';
pub const IS_CLOSED: char = '6';
