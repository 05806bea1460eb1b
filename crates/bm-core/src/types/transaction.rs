//! Executed trade as reported by the transaction-history endpoint.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::order::{OrderType, Side};

/// One executed trade. Immutable once stored in the ledger.
///
/// Monetary amounts arrive as wire floats; they are decoded through
/// `rust_decimal::serde::float` into exact decimals. `quantity` is signed:
/// positive for buys, negative for sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub product_id: i64,
    pub date: DateTime<FixedOffset>,
    #[serde(rename = "buysell", default)]
    pub side: Side,
    pub quantity: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float", default)]
    pub total: Decimal,
    #[serde(rename = "totalInBaseCurrency", with = "rust_decimal::serde::float", default)]
    pub total_in_base_currency: Decimal,
    #[serde(rename = "feeInBaseCurrency", with = "rust_decimal::serde::float", default)]
    pub fee: Decimal,
    #[serde(
        rename = "totalPlusFeeInBaseCurrency",
        with = "rust_decimal::serde::float",
        default
    )]
    pub total_plus_fee: Decimal,
    #[serde(rename = "orderTypeId", default)]
    pub order_type: OrderType,
    #[serde(rename = "counterParty", default)]
    pub counterparty: String,
    #[serde(default)]
    pub transfered: bool,
}
