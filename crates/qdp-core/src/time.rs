//! Conversions from vendor wire values.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Combine a `YYYYMMDD` trading date with a vendor `HH:MM:SS` time string.
///
/// Colons are stripped before parsing, so `"09:30:05"` and `"093005"` are
/// equivalent. Returns `None` when either part does not form a valid
/// timestamp.
#[must_use]
pub fn make_time(trading_date: u32, hhmmss: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::from_ymd_opt(
        (trading_date / 10_000) as i32,
        trading_date / 100 % 100,
        trading_date % 100,
    )?;

    let digits: String = hhmmss.chars().filter(|c| *c != ':').collect();
    let value: u32 = digits.trim().parse().ok()?;
    let time = NaiveTime::from_hms_opt(value / 10_000, value / 100 % 100, value % 100)?;
    Some(date.and_time(time))
}

/// Convert a vendor floating point amount to a decimal.
///
/// Non-finite inputs map to zero.
#[must_use]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}
