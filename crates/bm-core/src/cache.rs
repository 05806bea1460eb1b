//! Concurrency-safe stores for mirrored account state.
//!
//! [`EntityCache`] is the generic add/update/remove-by-id store used for
//! orders and positions; [`BalanceStore`] holds the single latest balance
//! snapshot. Each store is guarded by its own reader/writer lock, so readers
//! proceed concurrently and writers exclude only their own structure. No
//! operation ever holds two locks at once.

use std::sync::{PoisonError, RwLock};

use crate::types::Balance;

/// Behaviour required of entities stored in an [`EntityCache`].
pub trait CacheEntity: Clone {
    /// Primary key, unique within the cache.
    type Id: PartialEq + Clone;
    /// Secondary lookup key (e.g. product id for orders).
    type Key: PartialEq;

    fn id(&self) -> &Self::Id;
    fn secondary_key(&self) -> &Self::Key;

    /// Apply a sparse patch from a newer version of the same entity.
    /// Implementations copy only the fields the delta protocol may change,
    /// leaving everything else at its prior value.
    fn patch(&mut self, newer: &Self);
}

/// Generic concurrency-safe entity store.
///
/// All mutating operations are all-or-nothing under the write lock; readers
/// never observe a write in progress. Removal uses swap-remove, so insertion
/// order is not preserved (no consumer is order-sensitive).
#[derive(Debug, Default)]
pub struct EntityCache<T: CacheEntity> {
    entries: RwLock<Vec<T>>,
}

impl<T: CacheEntity> EntityCache<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Append a batch of new entities.
    pub fn add(&self, items: Vec<T>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.extend(items);
    }

    /// Patch existing entities in place by id. Ids with no match are ignored.
    pub fn update(&self, items: &[T]) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for entry in entries.iter_mut() {
            if let Some(newer) = items.iter().find(|i| i.id() == entry.id()) {
                entry.patch(newer);
            }
        }
    }

    /// Remove entities by id. Absent ids are a no-op.
    pub fn remove(&self, ids: &[T::Id]) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for i in (0..entries.len()).rev() {
            if ids.contains(entries[i].id()) {
                entries.swap_remove(i);
            }
        }
    }

    /// All entities matching the secondary key (linear scan, clones out).
    pub fn get(&self, key: &T::Key) -> Vec<T> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .filter(|e| e.secondary_key() == key)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone of the full contents, in unspecified order.
    pub fn snapshot(&self) -> Vec<T> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.clone()
    }
}

/// Holder for the single latest [`Balance`] snapshot. Last write wins.
#[derive(Debug, Default)]
pub struct BalanceStore {
    inner: RwLock<Balance>,
}

impl BalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, balance: Balance) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *inner = balance;
    }

    pub fn get(&self) -> Balance {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Order, Position};
    use rust_decimal_macros::dec;

    fn position(id: &str, size: i64) -> Position {
        Position {
            product_id: id.to_string(),
            size,
        }
    }

    #[test]
    fn add_and_get_by_key() {
        let cache = EntityCache::new();
        cache.add(vec![position("1", 10), position("2", 20)]);
        assert_eq!(cache.get(&"1".to_string()).len(), 1);
        assert_eq!(cache.get(&"2".to_string())[0].size, 20);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clear_empties_cache() {
        let cache = EntityCache::new();
        cache.add(vec![position("1", 10)]);
        cache.clear();
        assert!(cache.get(&"1".to_string()).is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn remove_absent_id_is_noop() {
        let cache = EntityCache::new();
        cache.add(vec![position("1", 10)]);
        cache.remove(&["7".to_string()]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"1".to_string())[0].size, 10);
    }

    #[test]
    fn remove_multiple_ids() {
        let cache = EntityCache::new();
        cache.add(vec![position("1", 10), position("2", 20), position("3", 30)]);
        cache.remove(&["1".to_string(), "3".to_string()]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"2".to_string()).len(), 1);
    }

    #[test]
    fn update_patches_in_place() {
        let cache = EntityCache::new();
        cache.add(vec![position("1", 10)]);
        cache.update(&[position("1", -5)]);
        assert_eq!(cache.get(&"1".to_string())[0].size, -5);
        // unknown id ignored
        cache.update(&[position("9", 99)]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn order_update_is_sparse_patch() {
        let cache = EntityCache::new();
        let mut order = Order {
            id: "o1".to_string(),
            product_id: 7,
            product_name: "ACME".to_string(),
            price: dec!(10),
            ..Order::default()
        };
        cache.add(vec![order.clone()]);

        // The patch carries a new price but an empty product name; the name
        // must survive because it is not part of the patch set.
        order.price = dec!(12);
        order.product_name = String::new();
        cache.update(&[order]);

        let got = &cache.get(&7)[0];
        assert_eq!(got.price, dec!(12));
        assert_eq!(got.product_name, "ACME");
    }

    #[test]
    fn balance_store_last_write_wins() {
        let store = BalanceStore::new();
        assert_eq!(store.get().cash, dec!(0));
        store.set(crate::types::Balance {
            cash: dec!(100),
            ..Default::default()
        });
        store.set(crate::types::Balance {
            cash: dec!(250.5),
            ..Default::default()
        });
        assert_eq!(store.get().cash, dec!(250.5));
    }
}
