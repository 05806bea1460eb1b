//! Product metadata lookup with a time-based cache.
//!
//! Metadata is a plain request→response mapping: fresh entries are served
//! from the cache, unknown ids are fetched inline, and stale entries are
//! queued for the next batched refresh tick instead of blocking the caller.

use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use ahash::{AHashMap, AHashSet};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Broker product taxonomy, used as a search filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductType {
    Stock = 1,
    Bond = 2,
    Currency = 3,
    Future = 7,
    Option = 8,
    Fund = 13,
    Leveraged = 14,
    Etf = 131,
    Index = 180,
    Cash = 311,
    Cfd = 535,
    Warrant = 536,
}

/// Search parameters for the product lookup endpoint.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub search_text: String,
    pub limit: u32,
    pub product_type: Option<ProductType>,
}

/// Product metadata — the subset the mirror consumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub isin: String,
    pub symbol: String,
    pub currency: String,
    pub product_type_id: i64,
    pub tradable: bool,
    pub exchange_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub contract_size: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub close_price: Decimal,
    /// Instrument id on the quote stream.
    pub vwd_id: String,
}

struct CachedProduct {
    product: Product,
    last_update: Instant,
}

/// Time-based product cache.
///
/// Does no I/O itself: [`split_fresh`](Self::split_fresh) partitions a
/// request into served/missing ids (queueing stale ones), the client fetches
/// the missing set and feeds it back through [`insert`](Self::insert). The
/// refresh loop drains [`take_pending`](Self::take_pending) once per tick.
pub struct ProductCache {
    entries: RwLock<AHashMap<String, CachedProduct>>,
    pending_refresh: Mutex<AHashSet<String>>,
    ttl: Duration,
}

impl ProductCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(AHashMap::new()),
            pending_refresh: Mutex::new(AHashSet::new()),
            ttl,
        }
    }

    /// Partition `ids` into products already cached and ids that must be
    /// fetched. Cached-but-stale entries are still served, but their ids are
    /// queued for the batched refresh.
    pub fn split_fresh(&self, ids: &[String]) -> (Vec<Product>, Vec<String>) {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut cached = Vec::new();
        let mut missing = Vec::new();
        let mut stale = Vec::new();
        for id in ids {
            match entries.get(id) {
                Some(entry) => {
                    if entry.last_update.elapsed() > self.ttl {
                        stale.push(id.clone());
                    }
                    cached.push(entry.product.clone());
                }
                None => missing.push(id.clone()),
            }
        }
        drop(entries);
        if !stale.is_empty() {
            let mut pending = self
                .pending_refresh
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            pending.extend(stale);
        }
        (cached, missing)
    }

    /// Store freshly fetched products.
    pub fn insert(&self, products: Vec<Product>) {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for product in products {
            entries.insert(
                product.id.clone(),
                CachedProduct {
                    product,
                    last_update: now,
                },
            );
        }
    }

    /// Drain the ids queued for refresh.
    pub fn take_pending(&self) -> Vec<String> {
        let mut pending = self
            .pending_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pending.drain().collect()
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
