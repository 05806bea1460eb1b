//! Historical-position accountant.
//!
//! Pure, deterministic computation over a date-sorted transaction list: the
//! ledger is partitioned into lots ([`HistoricalPosition`]) per product, and
//! each lot derives average cost and realized/unrealized performance. All
//! numeric edge cases (no buys yet, no usable quote) resolve to a sentinel
//! zero, never an error — callers treat zero as "not yet determinable".

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;

use bm_core::types::Transaction;
use bm_stream::ProductQuote;

/// One opened-then-(possibly)-closed lot for a product.
///
/// A lot is "open" while the running sum of signed quantities is non-zero;
/// once the sum returns to exactly zero the lot is sealed and the next
/// transaction for that product starts a new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalPosition {
    pub product_id: i64,
    transactions: Vec<Transaction>,
}

/// Weighted average price paid per unit across the buy-side transactions
/// seen so far: `-Σ total_plus_fee(buys) / Σ quantity(buys)`.
///
/// Zero when no buy quantity has accumulated (never divides by zero).
pub fn average_cost<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Decimal {
    let mut total_quantity: i64 = 0;
    let mut total_paid = Decimal::ZERO;
    for t in transactions {
        if t.quantity <= 0 {
            continue;
        }
        total_quantity += t.quantity;
        total_paid -= t.total_plus_fee;
    }
    if total_quantity == 0 {
        Decimal::ZERO
    } else {
        total_paid / Decimal::from(total_quantity)
    }
}

impl HistoricalPosition {
    fn new(product_id: i64) -> Self {
        Self {
            product_id,
            transactions: Vec::new(),
        }
    }

    /// Transactions of this lot, ascending by date.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Running sum of signed quantities; non-zero while the lot is open.
    pub fn size(&self) -> i64 {
        self.transactions.iter().map(|t| t.quantity).sum()
    }

    pub fn is_open(&self) -> bool {
        self.size() != 0
    }

    /// Average cost over the buys accumulated in this lot.
    pub fn average_cost(&self) -> Decimal {
        average_cost(&self.transactions)
    }

    /// Profit/loss crystallized by the lot's sells, each measured against
    /// the average cost of the buys strictly preceding it.
    pub fn realized_performance(&self) -> Decimal {
        self.realized(None)
    }

    /// Like [`realized_performance`](Self::realized_performance), counting
    /// only sells strictly after `since`.
    pub fn realized_performance_since(&self, since: DateTime<FixedOffset>) -> Decimal {
        self.realized(Some(since))
    }

    fn realized(&self, since: Option<DateTime<FixedOffset>>) -> Decimal {
        let mut result = Decimal::ZERO;
        let mut seen: Vec<&Transaction> = Vec::with_capacity(self.transactions.len());
        for t in &self.transactions {
            if t.quantity < 0 && since.is_none_or(|d| t.date > d) {
                let cost = average_cost(seen.iter().copied());
                result += (t.price - cost) * Decimal::from(t.quantity.abs()) + t.fee;
            }
            seen.push(t);
        }
        result
    }

    /// Realized performance as a percentage of the total buy amount.
    pub fn realized_performance_percent(&self) -> Decimal {
        let basis = self.total_buy_amount();
        if basis.is_zero() {
            return Decimal::ZERO;
        }
        self.realized_performance() * Decimal::from(100) / basis
    }

    /// `Σ quantity × price` over buy-side transactions; the denominator for
    /// percent performance.
    pub fn total_buy_amount(&self) -> Decimal {
        self.transactions
            .iter()
            .filter(|t| t.quantity > 0)
            .map(|t| Decimal::from(t.quantity) * t.price)
            .sum()
    }

    /// Mark-to-market performance of the open size against the quote mid:
    /// `((ask + bid) / 2 − avg cost) × size`.
    ///
    /// Zero when either quote side or the average cost is zero — no usable
    /// quote yet.
    pub fn unrealized_performance(&self, quote: &ProductQuote) -> Decimal {
        let cost = self.average_cost();
        if quote.bid_price.is_zero() || quote.ask_price.is_zero() || cost.is_zero() {
            return Decimal::ZERO;
        }
        let mid = (quote.ask_price + quote.bid_price) / Decimal::from(2);
        (mid - cost) * Decimal::from(self.size())
    }

    /// Unrealized performance as a percentage of the average cost.
    pub fn unrealized_performance_percent(&self, quote: &ProductQuote) -> Decimal {
        let cost = self.average_cost();
        if quote.bid_price.is_zero() || quote.ask_price.is_zero() || cost.is_zero() {
            return Decimal::ZERO;
        }
        let mid = (quote.ask_price + quote.bid_price) / Decimal::from(2);
        (mid - cost) * Decimal::from(100) / cost
    }

    pub fn first_transaction_date(&self) -> Option<DateTime<FixedOffset>> {
        self.transactions.first().map(|t| t.date)
    }

    pub fn last_transaction_date(&self) -> Option<DateTime<FixedOffset>> {
        self.transactions.last().map(|t| t.date)
    }
}

/// Partition a transaction list into historical positions.
///
/// Transactions are stable-sorted by date, grouped by product, and split
/// into lots wherever the running signed quantity returns to exactly zero.
/// The result is stable-sorted by each lot's first transaction date.
pub fn build_historical_positions(transactions: &[Transaction]) -> Vec<HistoricalPosition> {
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by_key(|t| t.date);

    // Group per product, keeping first-seen product order for determinism.
    let mut product_order: Vec<i64> = Vec::new();
    let mut grouped: ahash::AHashMap<i64, Vec<&Transaction>> = ahash::AHashMap::new();
    for t in sorted {
        let entry = grouped.entry(t.product_id).or_insert_with(|| {
            product_order.push(t.product_id);
            Vec::new()
        });
        entry.push(t);
    }

    let mut lots: Vec<HistoricalPosition> = Vec::new();
    for product_id in product_order {
        let mut current = HistoricalPosition::new(product_id);
        let Some(product_transactions) = grouped.get(&product_id) else {
            continue;
        };
        for t in product_transactions {
            current.transactions.push((*t).clone());
            if current.size() == 0 {
                lots.push(std::mem::replace(
                    &mut current,
                    HistoricalPosition::new(product_id),
                ));
            }
        }
        if !current.transactions.is_empty() {
            lots.push(current);
        }
    }

    lots.sort_by_key(|lot| lot.first_transaction_date());
    lots
}

#[cfg(test)]
mod tests {
    use super::*;
    use bm_core::types::{OrderType, Side};
    use rust_decimal_macros::dec;

    fn tx(id: i64, product_id: i64, day: u32, quantity: i64, price: Decimal, fee: Decimal) -> Transaction {
        let date = format!("2024-03-{day:02}T10:00:00+01:00")
            .parse::<DateTime<FixedOffset>>()
            .unwrap();
        let total = -price * Decimal::from(quantity);
        Transaction {
            id,
            product_id,
            date,
            side: if quantity > 0 { Side::Buy } else { Side::Sell },
            quantity,
            price,
            total,
            total_in_base_currency: total,
            fee,
            total_plus_fee: total + fee,
            order_type: OrderType::Limit,
            counterparty: String::new(),
            transfered: false,
        }
    }

    #[test]
    fn worked_example_average_cost_and_realized() {
        // buy 10 @ 100 with fee -1: total_plus_fee = -1001
        // sell 10 @ 110 with fee +1 (per the accounting convention: the fee
        // term is added to realized performance as stored)
        let buy = tx(1, 7, 1, 10, dec!(100), dec!(-1));
        let sell = tx(2, 7, 2, -10, dec!(110), dec!(1));

        let open = build_historical_positions(std::slice::from_ref(&buy));
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].average_cost(), dec!(100.1));
        assert!(open[0].is_open());

        let closed = build_historical_positions(&[buy.clone(), sell.clone()]);
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].size(), 0);
        assert!(!closed[0].is_open());
        // (110 - 100.1) * 10 + 1 = 100
        assert_eq!(closed[0].realized_performance(), dec!(100.0));

        // A later transaction starts a fresh lot.
        let reopen = tx(3, 7, 3, 5, dec!(120), dec!(0));
        let lots = build_historical_positions(&[buy, sell, reopen]);
        assert_eq!(lots.len(), 2);
        assert_eq!(lots[0].size(), 0);
        assert_eq!(lots[1].size(), 5);
        assert_eq!(lots[1].transaction_count(), 1);
    }

    #[test]
    fn zero_buy_quantity_average_cost_is_zero() {
        let lot_txs = [tx(1, 7, 1, -10, dec!(50), dec!(0))];
        assert_eq!(average_cost(&lot_txs), dec!(0));
        let lots = build_historical_positions(&lot_txs);
        assert_eq!(lots[0].average_cost(), dec!(0));
    }

    #[test]
    fn quantity_conservation_across_lots() {
        let txs = vec![
            tx(1, 7, 1, 10, dec!(10), dec!(0)),
            tx(2, 7, 2, -10, dec!(12), dec!(0)),
            tx(3, 7, 3, 4, dec!(11), dec!(0)),
            tx(4, 7, 4, -1, dec!(13), dec!(0)),
            tx(5, 9, 5, 2, dec!(20), dec!(0)),
        ];
        let lots = build_historical_positions(&txs);

        for product in [7i64, 9] {
            let lot_sum: i64 = lots
                .iter()
                .filter(|l| l.product_id == product)
                .map(|l| l.size())
                .sum();
            let tx_sum: i64 = txs
                .iter()
                .filter(|t| t.product_id == product)
                .map(|t| t.quantity)
                .sum();
            assert_eq!(lot_sum, tx_sum);
        }
    }

    #[test]
    fn realized_uses_running_average_not_final() {
        // Two buys at different prices with a sell in between: the sell must
        // be measured against the average of the buys before it only.
        let txs = vec![
            tx(1, 7, 1, 10, dec!(100), dec!(0)),
            tx(2, 7, 2, -5, dec!(110), dec!(0)),
            tx(3, 7, 3, 10, dec!(200), dec!(0)),
        ];
        let lots = build_historical_positions(&txs);
        assert_eq!(lots.len(), 1);
        // avg before the sell = 100, so realized = (110 - 100) * 5 = 50,
        // regardless of the later 200 buy.
        assert_eq!(lots[0].realized_performance(), dec!(50));
    }

    #[test]
    fn realized_since_filters_strictly_after() {
        let txs = vec![
            tx(1, 7, 1, 10, dec!(100), dec!(0)),
            tx(2, 7, 2, -5, dec!(110), dec!(0)),
            tx(3, 7, 4, -5, dec!(120), dec!(0)),
        ];
        let lots = build_historical_positions(&txs);
        let lot = &lots[0];
        assert_eq!(lot.realized_performance(), dec!(50) + dec!(100));

        // cut-off exactly at the first sell's date: strictly-after excludes it
        let cutoff = txs[1].date;
        assert_eq!(lot.realized_performance_since(cutoff), dec!(100));
    }

    #[test]
    fn unrealized_needs_quote_and_cost() {
        let lot_txs = [tx(1, 7, 1, 10, dec!(100), dec!(0))];
        let lots = build_historical_positions(&lot_txs);
        let lot = &lots[0];

        let no_quote = ProductQuote::default();
        assert_eq!(lot.unrealized_performance(&no_quote), dec!(0));

        let one_sided = ProductQuote {
            bid_price: dec!(101),
            ..Default::default()
        };
        assert_eq!(lot.unrealized_performance(&one_sided), dec!(0));

        let quote = ProductQuote {
            bid_price: dec!(101),
            ask_price: dec!(103),
            ..Default::default()
        };
        // mid 102, cost 100, size 10
        assert_eq!(lot.unrealized_performance(&quote), dec!(20));
        assert_eq!(lot.unrealized_performance_percent(&quote), dec!(2));
    }

    #[test]
    fn percent_performance_uses_total_buy_amount() {
        let txs = vec![
            tx(1, 7, 1, 10, dec!(100), dec!(0)),
            tx(2, 7, 2, -10, dec!(110), dec!(0)),
        ];
        let lots = build_historical_positions(&txs);
        assert_eq!(lots[0].total_buy_amount(), dec!(1000));
        assert_eq!(lots[0].realized_performance_percent(), dec!(10));
    }

    #[test]
    fn lots_sorted_by_first_transaction_date() {
        let txs = vec![
            tx(1, 9, 5, 2, dec!(20), dec!(0)),
            tx(2, 7, 1, 10, dec!(10), dec!(0)),
            tx(3, 7, 2, -10, dec!(12), dec!(0)),
            tx(4, 7, 6, 1, dec!(11), dec!(0)),
        ];
        let lots = build_historical_positions(&txs);
        assert_eq!(lots.len(), 3);
        assert_eq!(lots[0].product_id, 7); // opened day 1
        assert_eq!(lots[1].product_id, 9); // opened day 5
        assert_eq!(lots[2].product_id, 7); // reopened day 6
    }
}
