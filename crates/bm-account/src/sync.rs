//! Delta-snapshot decoding for the account update endpoint.
//!
//! Each sync cycle fetches one snapshot carrying three sections (orders,
//! positions, balance), every section tagged with a fresh server cursor.
//! Records arrive as dynamic name/value pairs; this module maps them onto
//! typed entities through explicit decode tables. Decoding failures are
//! isolated per record: one malformed entry is skipped and logged, the rest
//! of the batch still applies.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use bm_core::json;
use bm_core::types::{Balance, Order, Position, Side};
use bm_core::types::{OrderType, TimeType};

/// Wire envelope of the update endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateResponse {
    #[serde(default)]
    pub orders: Section,
    #[serde(default)]
    pub portfolio: Section,
    #[serde(default, rename = "totalPortfolio")]
    pub total_portfolio: BalanceSection,
}

/// One section: a fresh cursor plus the records changed since the last one.
#[derive(Debug, Default, Deserialize)]
pub struct Section {
    #[serde(default, rename = "lastUpdated")]
    pub last_updated: i64,
    #[serde(default)]
    pub value: Vec<DeltaRecord>,
}

/// The balance section: a cursor plus a flat name/value list (no per-record
/// ids or add/remove markers — the snapshot is replaced wholesale).
#[derive(Debug, Default, Deserialize)]
pub struct BalanceSection {
    #[serde(default, rename = "lastUpdated")]
    pub last_updated: i64,
    #[serde(default)]
    pub value: Vec<NamedValue>,
}

/// One changed record: add/remove markers plus a name/value field list.
#[derive(Debug, Default, Deserialize)]
pub struct DeltaRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "isAdded")]
    pub is_added: bool,
    #[serde(default, rename = "isRemoved")]
    pub is_removed: bool,
    #[serde(default)]
    pub value: Vec<NamedValue>,
}

#[derive(Debug, Deserialize)]
pub struct NamedValue {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

/// Decoded section, ready to apply in the mandatory add → update → remove
/// order (an id may appear both as added in this batch and as a stale
/// duplicate; applying removals last avoids resurrecting removed rows).
#[derive(Debug, Default)]
pub struct DeltaBatch<T> {
    pub added: Vec<T>,
    pub updated: Vec<T>,
    pub removed: Vec<String>,
}

fn mismatch(name: &str) -> Result<(), String> {
    Err(format!("unexpected value for field {name}"))
}

/// Decode table for order records. Unknown names are ignored; a type
/// mismatch or unparsable date fails the record.
fn apply_order_field(order: &mut Order, name: &str, value: &Value) -> Result<(), String> {
    match name {
        "productId" => match json::i64_field(value) {
            Some(v) => order.product_id = v,
            None => return mismatch(name),
        },
        "product" => match json::str_field(value) {
            Some(v) => order.product_name = v.to_string(),
            None => return mismatch(name),
        },
        "buysell" => match json::str_field(value).and_then(Side::from_short) {
            Some(v) => order.side = v,
            None => return mismatch(name),
        },
        "size" => match json::i64_field(value) {
            Some(v) => order.size = v,
            None => return mismatch(name),
        },
        "quantity" => match json::i64_field(value) {
            Some(v) => order.quantity = v,
            None => return mismatch(name),
        },
        "price" => match json::decimal_field(value) {
            Some(v) => order.price = v,
            None => return mismatch(name),
        },
        "stopPrice" => match json::decimal_field(value) {
            Some(v) => order.stop_price = v,
            None => return mismatch(name),
        },
        "totalOrderValue" => match json::decimal_field(value) {
            Some(v) => order.total_order_value = v,
            None => return mismatch(name),
        },
        "contractType" => match json::i64_field(value) {
            Some(v) => order.contract_type = v,
            None => return mismatch(name),
        },
        "contractSize" => match json::decimal_field(value) {
            Some(v) => order.contract_size = v,
            None => return mismatch(name),
        },
        "currency" => match json::str_field(value) {
            Some(v) => order.currency = v.to_string(),
            None => return mismatch(name),
        },
        "date" => {
            let today = chrono::Local::now().date_naive();
            match json::str_field(value).and_then(|s| parse_order_date(s, today)) {
                Some(v) => order.date = Some(v),
                None => return mismatch(name),
            }
        }
        "orderTypeId" => match json::i64_field(value).and_then(OrderType::from_i64) {
            Some(v) => order.order_type = v,
            None => return mismatch(name),
        },
        "orderTimeTypeId" => match json::i64_field(value).and_then(TimeType::from_i64) {
            Some(v) => order.time_type = v,
            None => return mismatch(name),
        },
        "isModifiable" => match json::bool_field(value) {
            Some(v) => order.is_modifiable = v,
            None => return mismatch(name),
        },
        "isDeletable" => match json::bool_field(value) {
            Some(v) => order.is_deletable = v,
            None => return mismatch(name),
        },
        // unknown field names are ignored on purpose
        _ => {}
    }
    Ok(())
}

/// Decode table for position records: only the signed size is dynamic.
fn apply_position_field(position: &mut Position, name: &str, value: &Value) -> Result<(), String> {
    match name {
        "size" => match json::i64_field(value) {
            Some(v) => position.size = v,
            None => return mismatch(name),
        },
        _ => {}
    }
    Ok(())
}

/// Order dates arrive as `HH:MM` for today's orders or `DD/MM` for older
/// ones (year implied).
fn parse_order_date(s: &str, today: NaiveDate) -> Option<NaiveDateTime> {
    if let Ok(time) = NaiveTime::parse_from_str(s, "%H:%M") {
        return Some(today.and_time(time));
    }
    let with_year = format!("{}/{}", s, today.year());
    NaiveDate::parse_from_str(&with_year, "%d/%m/%Y")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Decode the orders section. A removal marker takes precedence over
/// add/update for the same id; malformed records are skipped.
pub fn decode_orders(section: &Section) -> DeltaBatch<Order> {
    decode_section(section, |record| {
        let mut order = Order {
            id: record.id.clone(),
            ..Order::default()
        };
        for property in &record.value {
            apply_order_field(&mut order, &property.name, &property.value)?;
        }
        Ok(order)
    })
}

/// Decode the positions section.
pub fn decode_positions(section: &Section) -> DeltaBatch<Position> {
    decode_section(section, |record| {
        let mut position = Position {
            product_id: record.id.clone(),
            size: 0,
        };
        for property in &record.value {
            apply_position_field(&mut position, &property.name, &property.value)?;
        }
        Ok(position)
    })
}

fn decode_section<T>(
    section: &Section,
    decode: impl Fn(&DeltaRecord) -> Result<T, String>,
) -> DeltaBatch<T> {
    let mut batch = DeltaBatch {
        added: Vec::new(),
        updated: Vec::new(),
        removed: Vec::new(),
    };
    for record in &section.value {
        if record.is_removed {
            batch.removed.push(record.id.clone());
            continue;
        }
        match decode(record) {
            Ok(entity) => {
                if record.is_added {
                    batch.added.push(entity);
                } else {
                    batch.updated.push(entity);
                }
            }
            Err(reason) => {
                warn!("skipping malformed delta record {}: {reason}", record.id);
            }
        }
    }
    batch
}

/// Decode the balance section into a snapshot. Returns `None` when the
/// value list is empty (nothing to replace). `freeSpaceNew` arrives as an
/// object keyed by currency code; the configured base currency is taken.
pub fn decode_balance(section: &BalanceSection, base_currency: &str) -> Option<Balance> {
    if section.value.is_empty() {
        return None;
    }
    let mut balance = Balance::default();
    for property in &section.value {
        let ok = match property.name.as_str() {
            "cash" => json::decimal_field(&property.value)
                .map(|v| balance.cash = v)
                .is_some(),
            "freeSpaceNew" => property
                .value
                .get(base_currency)
                .and_then(json::decimal_field)
                .map(|v| balance.free_space = v)
                .is_some(),
            "reportPortfValue" => json::decimal_field(&property.value)
                .map(|v| balance.portfolio_value = v)
                .is_some(),
            "reportNetliq" => json::decimal_field(&property.value)
                .map(|v| balance.net_liquidation = v)
                .is_some(),
            _ => true,
        };
        if !ok {
            warn!("skipping malformed balance field: {}", property.name);
        }
    }
    Some(balance)
}
