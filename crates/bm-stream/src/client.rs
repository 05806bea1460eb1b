//! Quote-stream client: session lifecycle, subscriptions, poll loop.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use bm_core::error::BrokerError;
use bm_core::json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::indirection::IndirectionCache;
use crate::quote::{ProductQuote, TRACKED_FIELDS};

/// Quote-stream configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Quotecast service base URL (no trailing slash).
    pub base_url: String,
    /// Protocol version reported when requesting a session.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Account-scoped user token; assigned after login.
    #[serde(default)]
    pub user_token: i64,
    /// Poll period for the update loop.
    #[serde(default = "default_poll_period_ms")]
    pub poll_period_ms: u64,
    /// Referrer string included in the session request body.
    #[serde(default)]
    pub referrer: String,
}

fn default_api_version() -> String {
    "1.0.20180305".to_string()
}

fn default_poll_period_ms() -> u64 {
    1000
}

impl StreamConfig {
    pub fn new(base_url: impl Into<String>, user_token: i64) -> Self {
        Self {
            base_url: base_url.into(),
            api_version: default_api_version(),
            user_token,
            poll_period_ms: default_poll_period_ms(),
            referrer: String::new(),
        }
    }
}

/// Build the subscribe/unsubscribe control string for a set of instruments:
/// `req(id.field);` per instrument and tracked field (or `rel(…)` to
/// release), in per-instrument-then-per-field order.
pub fn control_data(issue_ids: &[String], subscribe: bool) -> String {
    let verb = if subscribe { "req" } else { "rel" };
    let mut out = String::new();
    for id in issue_ids {
        for field in TRACKED_FIELDS {
            out.push_str(verb);
            out.push('(');
            out.push_str(id);
            out.push('.');
            out.push_str(field);
            out.push_str(");");
        }
    }
    out
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    referrer: &'a str,
}

#[derive(Debug, Serialize)]
struct ControlRequest {
    #[serde(rename = "controlData")]
    control_data: String,
}

/// One update record from the session endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct UpdateRecord {
    #[serde(rename = "m")]
    pub opcode: String,
    #[serde(rename = "v", default)]
    pub args: Vec<Value>,
}

/// Outcome of applying one update record to the indirection cache.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Applied {
    /// Record handled (or ignored as an unknown opcode).
    Done,
    /// The server invalidated the session; a new one must be requested.
    RenewSession,
    /// Malformed arguments; record skipped.
    Skipped,
}

/// Apply a single update record. Malformed records are isolated: the caller
/// logs and continues with the rest of the batch.
pub(crate) fn apply_record(cache: &IndirectionCache, record: &UpdateRecord) -> Applied {
    match record.opcode.as_str() {
        "a_req" => {
            let (Some(name), Some(index)) = (
                record.args.first().and_then(|v| json::str_field(v)),
                record.args.get(1).and_then(json::i64_field),
            ) else {
                return Applied::Skipped;
            };
            cache.set_index(name.to_string(), index);
            Applied::Done
        }
        "un" => {
            let (Some(index), Some(value)) = (
                record.args.first().and_then(json::i64_field),
                record.args.get(1).and_then(json::decimal_field),
            ) else {
                return Applied::Skipped;
            };
            cache.set_decimal(index, value);
            Applied::Done
        }
        "us" => {
            let (Some(index), Some(value)) = (
                record.args.first().and_then(json::i64_field),
                record.args.get(1).and_then(|v| json::str_field(v)),
            ) else {
                return Applied::Skipped;
            };
            cache.set_text(index, value.to_string());
            Applied::Done
        }
        "sr" => Applied::RenewSession,
        other => {
            debug!("ignoring unknown stream opcode: {other}");
            Applied::Done
        }
    }
}

/// Client for the realtime quote stream.
///
/// Lifecycle: [`start`](Self::start) requests a session id and spawns the
/// poll loop; [`stop`](Self::stop) aborts it. Held behind `Arc` so the poll
/// task and callers share the same state.
pub struct QuoteStreamClient {
    http: reqwest::Client,
    config: StreamConfig,
    session_id: RwLock<Option<String>>,
    cache: IndirectionCache,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl QuoteStreamClient {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            session_id: RwLock::new(None),
            cache: IndirectionCache::new(),
            task: Mutex::new(None),
        }
    }

    /// Request a session id and start the poll loop.
    ///
    /// A session request failure is returned to the caller and nothing is
    /// started; once the loop runs, per-tick failures are only logged and
    /// retried on the next tick.
    pub async fn start(self: &Arc<Self>) -> Result<(), BrokerError> {
        self.renew_session().await?;

        let client = Arc::clone(self);
        let period = Duration::from_millis(self.config.poll_period_ms.max(1));
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // skip the immediate first tick
            loop {
                interval.tick().await;
                if let Err(e) = client.poll_once().await {
                    error!("quote stream poll failed: {e}");
                }
            }
        });

        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = task.replace(handle) {
            old.abort();
        }
        Ok(())
    }

    /// Abort the poll loop. The session id and indirection cache are kept,
    /// so a later [`start`](Self::start) resumes with fresh state from the
    /// server.
    pub fn stop(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }

    /// Subscribe all tracked fields for the given instruments.
    pub async fn subscribe(&self, issue_ids: &[String]) -> Result<(), BrokerError> {
        self.post_control(issue_ids, true).await
    }

    /// Release all tracked fields for the given instruments.
    pub async fn unsubscribe(&self, issue_ids: &[String]) -> Result<(), BrokerError> {
        self.post_control(issue_ids, false).await
    }

    /// Assemble the current quote for one instrument. Never fails: fields
    /// that have not streamed yet are their zero value.
    pub fn get_quote(&self, issue_id: &str) -> ProductQuote {
        let field = |name: &str| format!("{issue_id}.{name}");
        ProductQuote {
            issue_id: issue_id.to_string(),
            full_name: self.cache.text(&field("FullName")),
            last_price: self.cache.decimal(&field("LastPrice")),
            bid_price: self.cache.decimal(&field("BidPrice")),
            ask_price: self.cache.decimal(&field("AskPrice")),
            open_price: self.cache.decimal(&field("OpenPrice")),
            high_price: self.cache.decimal(&field("HighPrice")),
            low_price: self.cache.decimal(&field("LowPrice")),
            bid_volume: self.cache.decimal(&field("BidVolume")),
            ask_volume: self.cache.decimal(&field("AskVolume")),
        }
    }

    /// Fetch and apply one batch of update records.
    ///
    /// Public so callers that manage their own scheduling can tick manually;
    /// the spawned loop calls this once per period.
    pub async fn poll_once(&self) -> Result<(), BrokerError> {
        let session_id = self.current_session()?;
        let url = format!("{}/{}", self.config.base_url, session_id);
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(BrokerError::Status {
                code: resp.status().as_u16(),
            });
        }
        let records: Vec<UpdateRecord> = resp.json().await?;

        for record in &records {
            match apply_record(&self.cache, record) {
                Applied::Done => {}
                Applied::Skipped => {
                    warn!("skipping malformed stream record: {:?}", record.opcode);
                }
                Applied::RenewSession => {
                    // Server-side invalidation: get a fresh session and keep
                    // applying the remainder of the batch. The indirection
                    // maps are kept; new a_req records overwrite stale
                    // indices.
                    self.renew_session().await?;
                }
            }
        }
        Ok(())
    }

    async fn renew_session(&self) -> Result<(), BrokerError> {
        let url = format!(
            "{}/request_session?version={}&userToken={}",
            self.config.base_url, self.config.api_version, self.config.user_token
        );
        let resp = self
            .http
            .post(&url)
            .json(&SessionRequest {
                referrer: &self.config.referrer,
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(BrokerError::Status {
                code: resp.status().as_u16(),
            });
        }
        let session: SessionResponse = resp.json().await?;
        info!("quote stream session established: {}", session.session_id);
        let mut current = self
            .session_id
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *current = Some(session.session_id);
        Ok(())
    }

    async fn post_control(&self, issue_ids: &[String], subscribe: bool) -> Result<(), BrokerError> {
        let session_id = self.current_session()?;
        let url = format!("{}/{}", self.config.base_url, session_id);
        let resp = self
            .http
            .post(&url)
            .json(&ControlRequest {
                control_data: control_data(issue_ids, subscribe),
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(BrokerError::Status {
                code: resp.status().as_u16(),
            });
        }
        Ok(())
    }

    fn current_session(&self) -> Result<String, BrokerError> {
        let session = self
            .session_id
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        session
            .clone()
            .ok_or_else(|| BrokerError::Session("stream not started".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn control_string_order_is_exact() {
        let ids = vec!["A".to_string(), "B".to_string()];
        let expected = "req(A.BidPrice);req(A.AskPrice);req(A.LastPrice);req(A.BidVolume);\
                        req(A.AskVolume);req(A.OpenPrice);req(A.HighPrice);req(A.LowPrice);\
                        req(A.FullName);req(B.BidPrice);req(B.AskPrice);req(B.LastPrice);\
                        req(B.BidVolume);req(B.AskVolume);req(B.OpenPrice);req(B.HighPrice);\
                        req(B.LowPrice);req(B.FullName);";
        assert_eq!(control_data(&ids, true), expected);
        assert!(control_data(&ids, false).starts_with("rel(A.BidPrice);"));
    }

    #[test]
    fn empty_subscription_is_empty_string() {
        assert_eq!(control_data(&[], true), "");
    }

    fn record(opcode: &str, args: Vec<Value>) -> UpdateRecord {
        UpdateRecord {
            opcode: opcode.to_string(),
            args,
        }
    }

    #[test]
    fn apply_registers_index_and_values() {
        let cache = IndirectionCache::new();
        assert_eq!(
            apply_record(&cache, &record("a_req", vec![json!("360.BidPrice"), json!(42)])),
            Applied::Done
        );
        assert_eq!(
            apply_record(&cache, &record("un", vec![json!(42), json!(101.5)])),
            Applied::Done
        );
        assert_eq!(cache.decimal("360.BidPrice"), dec!(101.5));

        apply_record(&cache, &record("a_req", vec![json!("360.FullName"), json!(7)]));
        apply_record(&cache, &record("us", vec![json!(7), json!("Acme")]));
        assert_eq!(cache.text("360.FullName"), "Acme");
    }

    #[test]
    fn malformed_records_are_skipped() {
        let cache = IndirectionCache::new();
        assert_eq!(
            apply_record(&cache, &record("a_req", vec![json!(12), json!(42)])),
            Applied::Skipped
        );
        assert_eq!(
            apply_record(&cache, &record("un", vec![json!(42)])),
            Applied::Skipped
        );
        assert_eq!(
            apply_record(&cache, &record("us", vec![json!("x"), json!("y")])),
            Applied::Skipped
        );
    }

    #[test]
    fn session_reset_is_signalled() {
        let cache = IndirectionCache::new();
        assert_eq!(
            apply_record(&cache, &record("sr", vec![])),
            Applied::RenewSession
        );
    }

    #[test]
    fn unknown_opcode_is_ignored() {
        let cache = IndirectionCache::new();
        assert_eq!(
            apply_record(&cache, &record("h", vec![])),
            Applied::Done
        );
    }
}
