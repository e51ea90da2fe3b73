//! Session-scoped order identifier.
//!
//! An entrust id is the 10-digit zero-padded session id, a literal `#`, and
//! the 6-digit zero-padded order reference: `0000000005#000101`. It is the
//! only key that survives the round trip through the gateway, so it is used
//! to re-associate caller tags with order records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Exclusive upper bound for the session id part (10 digits).
pub const MAX_SESSION_ID: u64 = 10_000_000_000;
/// Exclusive upper bound for the order reference part (6 digits).
pub const MAX_ORDER_REF: u32 = 1_000_000;

const SEPARATOR: char = '#';

/// Encoded entrust identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntrustId(String);

impl EntrustId {
    /// Encode a session id and order reference.
    ///
    /// Values that do not fit the fixed digit widths are rejected instead of
    /// being truncated.
    pub fn encode(session_id: u64, order_ref: u32) -> Result<Self> {
        if session_id >= MAX_SESSION_ID {
            return Err(CoreError::OutOfRange {
                field: "session_id",
                value: session_id,
                max: MAX_SESSION_ID - 1,
            });
        }
        if order_ref >= MAX_ORDER_REF {
            return Err(CoreError::OutOfRange {
                field: "order_ref",
                value: u64::from(order_ref),
                max: u64::from(MAX_ORDER_REF - 1),
            });
        }
        Ok(Self(format!("{session_id:010}{SEPARATOR}{order_ref:06}")))
    }

    /// Decode an entrust id string into `(session_id, order_ref)`.
    ///
    /// Splits on the first `#`. Both sides must be non-empty unsigned
    /// decimal integers.
    pub fn decode(s: &str) -> Result<(u64, u32)> {
        let (session, order_ref) = s
            .split_once(SEPARATOR)
            .ok_or_else(|| CoreError::InvalidEntrustId(s.to_string()))?;

        let session_id = parse_digits::<u64>(session, s)?;
        let order_ref = parse_digits::<u32>(order_ref, s)?;
        Ok((session_id, order_ref))
    }

    /// Session id part.
    #[must_use]
    pub fn session_id(&self) -> u64 {
        // Validated at construction.
        Self::decode(&self.0).map(|(s, _)| s).unwrap_or_default()
    }

    /// Order reference part.
    #[must_use]
    pub fn order_ref(&self) -> u32 {
        Self::decode(&self.0).map(|(_, r)| r).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn parse_digits<T: FromStr>(part: &str, whole: &str) -> Result<T> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::InvalidEntrustId(whole.to_string()));
    }
    part.parse::<T>()
        .map_err(|_| CoreError::InvalidEntrustId(whole.to_string()))
}

impl fmt::Display for EntrustId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntrustId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for EntrustId {
    type Err = CoreError;

    /// Parse and normalize to the fixed-width form.
    fn from_str(s: &str) -> Result<Self> {
        let (session_id, order_ref) = Self::decode(s)?;
        Self::encode(session_id, order_ref)
    }
}

impl TryFrom<String> for EntrustId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<EntrustId> for String {
    fn from(id: EntrustId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_fixed_width() {
        let id = EntrustId::encode(5, 101).unwrap();
        assert_eq!(id.as_str(), "0000000005#000101");
        assert_eq!(id.session_id(), 5);
        assert_eq!(id.order_ref(), 101);
    }

    #[test]
    fn test_round_trip_boundaries() {
        for &(s, r) in &[
            (0u64, 0u32),
            (1, 1),
            (MAX_SESSION_ID - 1, MAX_ORDER_REF - 1),
            (1_234_567_890, 654_321),
        ] {
            let id = EntrustId::encode(s, r).unwrap();
            assert_eq!(EntrustId::decode(id.as_str()).unwrap(), (s, r));
        }
    }

    #[test]
    fn test_encode_rejects_overflow() {
        assert!(matches!(
            EntrustId::encode(MAX_SESSION_ID, 1),
            Err(CoreError::OutOfRange { field: "session_id", .. })
        ));
        assert!(matches!(
            EntrustId::encode(1, MAX_ORDER_REF),
            Err(CoreError::OutOfRange { field: "order_ref", .. })
        ));
    }

    #[test]
    fn test_decode_without_separator() {
        for s in ["", "0000000005000101", "abc", "12-34"] {
            assert!(matches!(
                EntrustId::decode(s),
                Err(CoreError::InvalidEntrustId(_))
            ));
        }
    }

    #[test]
    fn test_decode_splits_on_first_separator() {
        assert_eq!(EntrustId::decode("7#42").unwrap(), (7, 42));
        // Second '#' lands in the order ref side and is not a digit.
        assert!(EntrustId::decode("7#4#2").is_err());
        assert!(EntrustId::decode("#42").is_err());
        assert!(EntrustId::decode("x#42").is_err());
    }

    #[test]
    fn test_from_str_normalizes() {
        let id: EntrustId = "5#101".parse().unwrap();
        assert_eq!(id.to_string(), "0000000005#000101");
    }

    #[test]
    fn test_serde_as_string() {
        let id = EntrustId::encode(3, 9).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"0000000003#000009\"");
        let back: EntrustId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<EntrustId>("\"bogus\"").is_err());
    }
}
