//! Pending order representation and the related wire enums.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::cache::CacheEntity;

/// Order side.
///
/// The delta protocol sends the short form (`"B"` / `"S"`), the order
/// placement endpoint expects the long form (`"BUY"` / `"SELL"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    #[default]
    Buy,
    Sell,
}

impl Side {
    /// Parse the one-letter wire form used by the delta protocol.
    pub fn from_short(s: &str) -> Option<Self> {
        match s {
            "B" => Some(Side::Buy),
            "S" => Some(Side::Sell),
            _ => None,
        }
    }

    fn as_long(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl Serialize for Side {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_long())
    }
}

impl<'de> Deserialize<'de> for Side {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "B" | "BUY" => Ok(Side::Buy),
            "S" | "SELL" => Ok(Side::Sell),
            other => Err(de::Error::custom(format!("unknown order side: {other}"))),
        }
    }
}

/// Order kind, serialized as the broker's numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderType {
    #[default]
    Limit = 0,
    StopLimit = 1,
    Market = 2,
    StopLoss = 3,
}

impl OrderType {
    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(OrderType::Limit),
            1 => Some(OrderType::StopLimit),
            2 => Some(OrderType::Market),
            3 => Some(OrderType::StopLoss),
            _ => None,
        }
    }
}

impl Serialize for OrderType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(*self as i64)
    }
}

impl<'de> Deserialize<'de> for OrderType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = i64::deserialize(deserializer)?;
        OrderType::from_i64(v).ok_or_else(|| de::Error::custom(format!("unknown order type id: {v}")))
    }
}

/// Order validity, serialized as the broker's numeric id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeType {
    /// Valid for the trading day.
    #[default]
    Day = 1,
    /// Good till cancelled.
    Gtc = 3,
}

impl TimeType {
    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            1 => Some(TimeType::Day),
            3 => Some(TimeType::Gtc),
            _ => None,
        }
    }
}

impl Serialize for TimeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(*self as i64)
    }
}

impl<'de> Deserialize<'de> for TimeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = i64::deserialize(deserializer)?;
        TimeType::from_i64(v).ok_or_else(|| de::Error::custom(format!("unknown time type id: {v}")))
    }
}

/// A pending (working) order as mirrored from the delta protocol.
///
/// Fields absent from a partial update keep their previous value; see
/// [`CacheEntity::patch`] for the exact patch set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    pub id: String,
    /// Wall-clock placement time; the wire sends `HH:MM` for today's orders
    /// and `DD/MM` for older ones, so no offset is available.
    pub date: Option<NaiveDateTime>,
    pub product_id: i64,
    pub product_name: String,
    pub contract_type: i64,
    pub contract_size: Decimal,
    pub currency: String,
    pub side: Side,
    pub size: i64,
    pub quantity: i64,
    pub price: Decimal,
    pub stop_price: Decimal,
    pub total_order_value: Decimal,
    pub order_type: OrderType,
    pub time_type: TimeType,
    pub is_modifiable: bool,
    pub is_deletable: bool,
}

impl CacheEntity for Order {
    type Id = String;
    type Key = i64;

    fn id(&self) -> &String {
        &self.id
    }

    fn secondary_key(&self) -> &i64 {
        &self.product_id
    }

    /// Sparse patch: only the fields the delta protocol mutates on an
    /// existing order are copied; identity fields keep their prior value.
    fn patch(&mut self, newer: &Self) {
        self.quantity = newer.quantity;
        self.price = newer.price;
        self.stop_price = newer.stop_price;
        self.total_order_value = newer.total_order_value;
        self.order_type = newer.order_type;
        self.time_type = newer.time_type;
        self.is_modifiable = newer.is_modifiable;
        self.is_deletable = newer.is_deletable;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_wire_forms() {
        assert_eq!(Side::from_short("B"), Some(Side::Buy));
        assert_eq!(Side::from_short("S"), Some(Side::Sell));
        assert_eq!(Side::from_short("X"), None);
        assert_eq!(serde_json::to_string(&Side::Sell).unwrap(), "\"SELL\"");
        let side: Side = serde_json::from_str("\"B\"").unwrap();
        assert_eq!(side, Side::Buy);
    }

    #[test]
    fn order_type_roundtrip() {
        assert_eq!(OrderType::from_i64(2), Some(OrderType::Market));
        assert_eq!(OrderType::from_i64(9), None);
        assert_eq!(serde_json::to_string(&OrderType::StopLoss).unwrap(), "3");
    }
}
