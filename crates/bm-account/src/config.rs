//! Account client configuration.

use serde::Deserialize;

use bm_stream::StreamConfig;

/// Settings for [`AccountClient`](crate::AccountClient).
///
/// Only the credentials and base URLs are mandatory; every period has a
/// production default matching the upstream web client's behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub username: String,
    pub password: String,

    /// Trader base URL (no trailing slash).
    pub base_url: String,

    /// Quote-stream settings; the user token is filled in after login.
    pub stream: StreamConfig,

    /// Delta sync period in milliseconds.
    #[serde(default = "default_update_period_ms")]
    pub update_period_ms: u64,

    /// Transaction-history sync period in seconds.
    #[serde(default = "default_history_period_secs")]
    pub history_period_secs: u64,

    /// Product metadata time-to-live in seconds.
    #[serde(default = "default_product_ttl_secs")]
    pub product_ttl_secs: u64,

    /// Batched product refresh period in seconds.
    #[serde(default = "default_product_refresh_secs")]
    pub product_refresh_secs: u64,

    /// Minimum interval between relogin attempts after a 401.
    #[serde(default = "default_relogin_cooldown_secs")]
    pub relogin_cooldown_secs: u64,

    /// Currency code used to pick the free-space entry out of the balance
    /// section.
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
}

fn default_update_period_ms() -> u64 {
    2000
}

fn default_history_period_secs() -> u64 {
    60
}

fn default_product_ttl_secs() -> u64 {
    24 * 3600
}

fn default_product_refresh_secs() -> u64 {
    60
}

fn default_relogin_cooldown_secs() -> u64 {
    15
}

fn default_base_currency() -> String {
    "EUR".to_string()
}

impl AccountConfig {
    /// Config with production defaults for every period.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        base_url: impl Into<String>,
        stream_base_url: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            base_url: base_url.into(),
            stream: StreamConfig::new(stream_base_url, 0),
            update_period_ms: default_update_period_ms(),
            history_period_secs: default_history_period_secs(),
            product_ttl_secs: default_product_ttl_secs(),
            product_refresh_secs: default_product_refresh_secs(),
            relogin_cooldown_secs: default_relogin_cooldown_secs(),
            base_currency: default_base_currency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let json = r#"{
            "username": "u",
            "password": "p",
            "base_url": "https://trader.example.com",
            "stream": { "base_url": "https://quotes.example.com" }
        }"#;
        let cfg: AccountConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.update_period_ms, 2000);
        assert_eq!(cfg.history_period_secs, 60);
        assert_eq!(cfg.relogin_cooldown_secs, 15);
        assert_eq!(cfg.base_currency, "EUR");
        assert_eq!(cfg.stream.poll_period_ms, 1000);
    }
}
