//! Shared domain types: orders, positions, balance, transactions.

pub mod balance;
pub mod order;
pub mod position;
pub mod transaction;

pub use balance::Balance;
pub use order::{Order, OrderType, Side, TimeType};
pub use position::Position;
pub use transaction::Transaction;
