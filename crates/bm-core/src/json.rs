//! Helpers for decoding dynamic name/value property lists.
//!
//! The account delta endpoint and the quote stream both send values as
//! untyped JSON (`serde_json::Value`). These helpers extract typed values
//! and return `None` on any shape mismatch so callers can skip-and-log a
//! single bad field without abandoning the rest of the batch.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

/// Extract a [`Decimal`] from a JSON number or numeric string.
///
/// Numbers go through their textual form (`Number::to_string`), which is the
/// shortest decimal representation of the wire value. That keeps `100.1` as
/// `100.1` instead of the binary-float round-trip artifact.
pub fn decimal_field(v: &Value) -> Option<Decimal> {
    match v {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}

/// Extract an `i64` from a JSON number (integral floats accepted).
pub fn i64_field(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))
}

/// Extract a string slice.
pub fn str_field(v: &Value) -> Option<&str> {
    v.as_str()
}

/// Extract a boolean.
pub fn bool_field(v: &Value) -> Option<bool> {
    v.as_bool()
}
