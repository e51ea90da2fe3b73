//! Investor id to numeric account id transform.
//!
//! The order insert request carries the investor as a bounded integer. The
//! counterparty derives it from the investor string with a fixed digit
//! extraction rule, and the result must match it exactly.

/// Longest investor id that still yields a non-zero number.
const MAX_LEN: usize = 19;
/// Up to this length the whole buffer is parsed.
const FULL_PARSE_LEN: usize = 9;
/// Longer ids keep only this many trailing characters.
const TAIL_LEN: usize = 8;

/// Convert an investor id to its numeric form.
///
/// Length is measured in bytes. Every byte that is not an ASCII digit is
/// replaced with `'0'` before parsing.
#[must_use]
pub fn investor_id_to_num(investor_id: &str) -> i32 {
    let bytes = investor_id.as_bytes();
    let len = bytes.len();
    if len == 0 || len > MAX_LEN {
        return 0;
    }

    let digits = if len > FULL_PARSE_LEN {
        &bytes[len - TAIL_LEN..]
    } else {
        bytes
    };

    // At most 9 digits, fits in i32.
    digits.iter().fold(0i32, |acc, &b| {
        let d = if b.is_ascii_digit() { i32::from(b - b'0') } else { 0 };
        acc * 10 + d
    })
}
