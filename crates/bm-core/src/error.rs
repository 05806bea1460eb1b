//! Typed error definitions for the brokerage mirror.
//!
//! Provides [`BrokerError`] for domain-specific errors that are more
//! informative than plain `anyhow::Error` strings. All variants implement
//! `std::error::Error` via `thiserror`, so they integrate seamlessly with
//! `anyhow::Result` in caller code.

use thiserror::Error;

/// Domain-specific errors surfaced by the account and quote-stream clients.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Network-level failure (connect, timeout, body read).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status code.
    #[error("unexpected HTTP status: {code}")]
    Status { code: u16 },

    /// A response body could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// An authenticated call was attempted before a session was established.
    #[error("no active session, login first")]
    Unauthenticated,

    /// A 401 triggered a relogin attempt and the relogin itself failed.
    #[error("relogin after 401 failed: {source}")]
    Relogin {
        #[source]
        source: Box<BrokerError>,
    },

    /// Quote-stream session management error.
    #[error("quote stream session error: {0}")]
    Session(String),

    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),
}
