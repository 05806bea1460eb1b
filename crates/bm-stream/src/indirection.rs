//! Two-level name→index→value indirection cache.
//!
//! The stream transmits each field name once (`a_req` record) together with
//! a numeric index; subsequent value updates reference only the index. The
//! name→index map is append-only within a session (re-registration
//! overwrites), index→value is last-write-wins. On session renewal the maps
//! are deliberately kept: stale indices are overwritten as fresh `a_req`
//! records arrive for the new session.

use std::sync::{PoisonError, RwLock};

use ahash::AHashMap;
use rust_decimal::Decimal;

/// A streamed field value: decimal (`un` records) or text (`us` records).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Decimal(Decimal),
    Text(String),
}

/// The indirection cache. Owned exclusively by the stream client; readers
/// resolve quotes through [`decimal`](IndirectionCache::decimal) /
/// [`text`](IndirectionCache::text).
#[derive(Debug, Default)]
pub struct IndirectionCache {
    indexes: RwLock<AHashMap<String, i64>>,
    values: RwLock<AHashMap<i64, FieldValue>>,
}

impl IndirectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or overwrite) the index for a field name.
    pub fn set_index(&self, name: String, index: i64) {
        let mut indexes = self.indexes.write().unwrap_or_else(PoisonError::into_inner);
        indexes.insert(name, index);
    }

    pub fn set_decimal(&self, index: i64, value: Decimal) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(index, FieldValue::Decimal(value));
    }

    pub fn set_text(&self, index: i64, value: String) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(index, FieldValue::Text(value));
    }

    /// Resolve `name → index → decimal value`; any unresolved step (or a
    /// text value under the index) yields zero.
    pub fn decimal(&self, name: &str) -> Decimal {
        match self.lookup(name) {
            Some(FieldValue::Decimal(d)) => d,
            _ => Decimal::ZERO,
        }
    }

    /// Resolve `name → index → text value`; any unresolved step yields the
    /// empty string.
    pub fn text(&self, name: &str) -> String {
        match self.lookup(name) {
            Some(FieldValue::Text(s)) => s,
            _ => String::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<FieldValue> {
        let index = {
            let indexes = self.indexes.read().unwrap_or_else(PoisonError::into_inner);
            indexes.get(name).copied()?
        };
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.get(&index).cloned()
    }
}
