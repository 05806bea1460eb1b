//! # bm-stream
//!
//! Realtime market-data subscription client.
//!
//! The quote feed works over a server-assigned session: a `request_session`
//! call yields a session id, after which a timer-driven loop long-polls the
//! session endpoint for update records. Field names are only transmitted
//! once — updates resolve through a two-level name→index→value indirection
//! cache (see [`indirection`]).
//!
//! ## Modules
//!
//! - [`client`] — [`QuoteStreamClient`]: session lifecycle, control-string
//!   subscribe/unsubscribe, poll loop
//! - [`indirection`] — the two-level indirection cache
//! - [`quote`] — [`ProductQuote`] and the tracked field set

pub mod client;
pub mod indirection;
pub mod quote;

pub use client::{QuoteStreamClient, StreamConfig, control_data};
pub use quote::{ProductQuote, TRACKED_FIELDS};
