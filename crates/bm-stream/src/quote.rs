//! Streamed quote snapshot for one instrument.

use rust_decimal::Decimal;

/// Field names tracked for every subscribed instrument, in the order they
/// appear in subscribe/unsubscribe control strings.
pub const TRACKED_FIELDS: [&str; 9] = [
    "BidPrice",
    "AskPrice",
    "LastPrice",
    "BidVolume",
    "AskVolume",
    "OpenPrice",
    "HighPrice",
    "LowPrice",
    "FullName",
];

/// Point-in-time quote assembled from the indirection cache.
///
/// A quote for an unsubscribed or not-yet-updated instrument is the all-zero
/// value, never an error: callers treat zero bid/ask as "no usable quote".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuote {
    pub issue_id: String,
    pub full_name: String,
    pub last_price: Decimal,
    pub bid_price: Decimal,
    pub ask_price: Decimal,
    pub open_price: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
    pub bid_volume: Decimal,
    pub ask_volume: Decimal,
}
