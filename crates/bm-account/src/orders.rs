//! Order placement and cancellation.
//!
//! Placement is two-phase: a check call validates the order and returns a
//! confirmation id (plus projected fees), then a confirm call places it and
//! yields the broker-assigned order id. Cancellation is a single
//! delete-by-id. The HTTP plumbing lives in [`crate::client`]; this module
//! defines the wire shapes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bm_core::types::{OrderType, Side, TimeType};

/// Input for placing an order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    #[serde(rename = "buySell")]
    pub side: Side,
    #[serde(rename = "orderType")]
    pub order_type: OrderType,
    #[serde(rename = "productId")]
    pub product_id: String,
    #[serde(rename = "size")]
    pub quantity: i64,
    #[serde(rename = "timeType")]
    pub time_type: TimeType,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(rename = "stopPrice", with = "rust_decimal::serde::float")]
    pub stop_price: Decimal,
}

/// A projected fee or tax returned by the check phase.
#[derive(Debug, Clone, Deserialize)]
pub struct Fee {
    #[serde(default)]
    pub id: i64,
    #[serde(with = "rust_decimal::serde::float", default)]
    pub amount: Decimal,
    #[serde(default)]
    pub currency: String,
}

/// Result of a successful two-phase placement: the broker-assigned order id
/// plus the fees and taxes projected by the check phase.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_id: String,
    pub projected_fees: Vec<Fee>,
    pub projected_taxes: Vec<Fee>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CheckOrderResponse {
    pub data: CheckOrderData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CheckOrderData {
    #[serde(rename = "confirmationId")]
    pub confirmation_id: String,
    #[serde(rename = "transactionFees", default)]
    pub transaction_fees: Vec<Fee>,
    #[serde(rename = "transactionTaxes", default)]
    pub transaction_taxes: Vec<Fee>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConfirmOrderResponse {
    pub data: ConfirmOrderData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConfirmOrderData {
    #[serde(rename = "orderId")]
    pub order_id: String,
}
