//! Latest account totals.

use rust_decimal::Decimal;

/// Account totals snapshot, replaced wholesale on each balance delta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Balance {
    /// Available cash.
    pub cash: Decimal,
    /// Free space in the configured base currency.
    pub free_space: Decimal,
    /// Reported portfolio value.
    pub portfolio_value: Decimal,
    /// Reported net liquidation value.
    pub net_liquidation: Decimal,
}
