//! # bm-account
//!
//! Client that maintains a continuously refreshed local mirror of a
//! brokerage account: pending orders, open positions, cash balance, and the
//! transaction-derived history of opened/closed lots.
//!
//! ## Architecture
//!
//! ```text
//! AccountClient
//! ├── delta sync loop      (incremental order/position/balance snapshots)
//! ├── history sync loop    (transaction windows → ledger → accountant)
//! ├── product refresh loop (batched metadata refresh for stale entries)
//! └── QuoteStreamClient    (realtime quotes, independent timer)
//! ```
//!
//! All loops run on their own fixed-period timers and interact only through
//! the shared caches; a failure in one cycle is logged and retried on the
//! next tick, never propagated across tasks. [`AccountClient::stop`] aborts
//! every task explicitly.

pub mod client;
pub mod config;
pub mod orders;
pub mod positions;
pub mod products;
pub mod sync;
pub mod transactions;

pub use client::AccountClient;
pub use config::AccountConfig;
pub use orders::{Fee, OrderRequest, PlacedOrder};
pub use positions::{HistoricalPosition, average_cost, build_historical_positions};
pub use products::{Product, ProductType, SearchOptions};
pub use transactions::TransactionLedger;
