//! Transaction ledger: id-deduplicated, date-sorted, with a derived
//! historical-position view recomputed on every merge.

use std::sync::{PoisonError, RwLock};

use ahash::AHashSet;

use bm_core::types::Transaction;

use crate::positions::{HistoricalPosition, build_historical_positions};

#[derive(Debug, Default)]
struct LedgerInner {
    transactions: Vec<Transaction>,
    positions: Vec<HistoricalPosition>,
}

/// Append-only, id-deduplicated transaction store.
///
/// A single lock guards both the ledger and the derived view so readers
/// always see a view consistent with the transactions that produced it.
#[derive(Debug, Default)]
pub struct TransactionLedger {
    inner: RwLock<LedgerInner>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch: transactions whose id is already present are skipped
    /// (content is not compared — transactions are immutable once stored),
    /// the rest are appended, the ledger is stable-sorted ascending by date,
    /// and the historical-position view is recomputed synchronously.
    ///
    /// Merging the same batch twice is a no-op the second time.
    pub fn merge(&self, batch: Vec<Transaction>) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut known: AHashSet<i64> = inner.transactions.iter().map(|t| t.id).collect();
        for transaction in batch {
            if known.insert(transaction.id) {
                inner.transactions.push(transaction);
            }
        }
        inner.transactions.sort_by_key(|t| t.date);
        inner.positions = build_historical_positions(&inner.transactions);
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone of the full ledger, ascending by date.
    pub fn transactions(&self) -> Vec<Transaction> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.transactions.clone()
    }

    /// Clone of the derived historical-position view.
    pub fn historical_positions(&self) -> Vec<HistoricalPosition> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.positions.clone()
    }

    /// All lots (sealed and open) for one product.
    pub fn positions_for_product(&self, product_id: i64) -> Vec<HistoricalPosition> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .positions
            .iter()
            .filter(|p| p.product_id == product_id)
            .cloned()
            .collect()
    }

    /// The currently open lot for a product, if any.
    pub fn open_position_for_product(&self, product_id: i64) -> Option<HistoricalPosition> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .positions
            .iter()
            .find(|p| p.product_id == product_id && p.size() > 0)
            .cloned()
    }
}
