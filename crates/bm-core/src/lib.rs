//! # bm-core
//!
//! Core crate for the brokerage account mirror, providing:
//!
//! - **Types** (`types`) — orders, positions, balance, transactions
//! - **Caches** (`cache`) — generic entity cache + balance store
//! - **Error types** (`error`) — domain-specific `BrokerError` via thiserror
//! - **JSON helpers** (`json`) — typed extraction from dynamic name/value pairs
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod cache;
pub mod error;
pub mod json;
pub mod logging;
pub mod types;

// Re-export types at crate root for convenience.
pub use types::*;
