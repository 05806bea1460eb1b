//! Current open position for one product.

use crate::cache::CacheEntity;

/// Open size for a product, keyed by the product id.
///
/// A size of 0 is a valid state (fully closed but still reported).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    pub product_id: String,
    /// Signed size: positive long, negative short.
    pub size: i64,
}

impl CacheEntity for Position {
    type Id = String;
    type Key = String;

    fn id(&self) -> &String {
        &self.product_id
    }

    fn secondary_key(&self) -> &String {
        &self.product_id
    }

    fn patch(&mut self, newer: &Self) {
        self.size = newer.size;
    }
}
