//! Trader-API client: login, session guard, sync loops, order entry.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use ahash::AHashMap;
use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use bm_core::cache::{BalanceStore, EntityCache};
use bm_core::error::BrokerError;
use bm_core::types::{Balance, Order, Position, Transaction};
use bm_stream::{ProductQuote, QuoteStreamClient};

use crate::config::AccountConfig;
use crate::orders::{CheckOrderResponse, ConfirmOrderResponse, OrderRequest, PlacedOrder};
use crate::positions::HistoricalPosition;
use crate::products::{Product, ProductCache, SearchOptions};
use crate::sync::{self, UpdateResponse};
use crate::transactions::TransactionLedger;

/// Authenticated session state, replaced wholesale on every (re)login.
#[derive(Debug, Clone)]
struct Session {
    session_id: String,
    /// Trading account number, part of most secure endpoint paths.
    account_id: i64,
    /// Client id, doubles as the user token on the quote stream.
    client_id: i64,
}

/// Per-section server cursors echoed back on the next delta request.
#[derive(Debug, Clone, Copy, Default)]
struct Cursors {
    orders: i64,
    portfolio: i64,
    total_portfolio: i64,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(rename = "isPassCodeReset")]
    is_pass_code_reset: bool,
    #[serde(rename = "isRedirectToMobile")]
    is_redirect_to_mobile: bool,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct ClientInfoResponse {
    data: ClientInfo,
}

#[derive(Debug, Deserialize)]
struct ClientInfo {
    id: i64,
    #[serde(rename = "intAccount")]
    int_account: i64,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ProductsInfoResponse {
    #[serde(default)]
    data: AHashMap<String, Product>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    products: Vec<Product>,
}

/// Client maintaining a live local mirror of one brokerage account.
///
/// [`start`](Self::start) logs in, opens the quote stream, and spawns the
/// delta, history, and product-refresh loops. All reads are served from the
/// local caches and never block on the network.
pub struct AccountClient {
    http: reqwest::Client,
    config: AccountConfig,
    session: RwLock<Option<Session>>,
    /// Serializes relogin attempts and carries the last login instant for
    /// the cooldown check.
    relogin_gate: tokio::sync::Mutex<Option<Instant>>,
    orders: EntityCache<Order>,
    positions: EntityCache<Position>,
    balance: BalanceStore,
    cursors: Mutex<Cursors>,
    ledger: TransactionLedger,
    products: ProductCache,
    stream: RwLock<Option<Arc<QuoteStreamClient>>>,
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl AccountClient {
    pub fn new(config: AccountConfig) -> Self {
        let product_ttl = Duration::from_secs(config.product_ttl_secs);
        Self {
            http: reqwest::Client::new(),
            config,
            session: RwLock::new(None),
            relogin_gate: tokio::sync::Mutex::new(None),
            orders: EntityCache::new(),
            positions: EntityCache::new(),
            balance: BalanceStore::new(),
            cursors: Mutex::new(Cursors::default()),
            ledger: TransactionLedger::new(),
            products: ProductCache::new(product_ttl),
            stream: RwLock::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    // --- session lifecycle ---

    /// Authenticate and fetch the account/client ids the secure endpoints
    /// need. Replaces any previous session.
    pub async fn login(&self) -> Result<(), BrokerError> {
        let mut last_login = self.relogin_gate.lock().await;
        self.login_inner().await?;
        *last_login = Some(Instant::now());
        Ok(())
    }

    async fn login_inner(&self) -> Result<(), BrokerError> {
        let url = format!("{}/login/secure/login", self.config.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&LoginRequest {
                username: &self.config.username,
                password: &self.config.password,
                is_pass_code_reset: false,
                is_redirect_to_mobile: false,
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(BrokerError::Session(format!(
                "login rejected with status {}",
                resp.status().as_u16()
            )));
        }
        let login: LoginResponse = resp.json().await?;

        let info_url = format!("{}/pa/secure/client", self.config.base_url);
        let resp = self
            .http
            .get(&info_url)
            .query(&[("sessionId", login.session_id.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(BrokerError::Session(format!(
                "client info rejected with status {}",
                resp.status().as_u16()
            )));
        }
        let info: ClientInfoResponse = resp.json().await?;

        info!(
            account_id = info.data.int_account,
            "session established for {}", self.config.username
        );
        let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
        *session = Some(Session {
            session_id: login.session_id,
            account_id: info.data.int_account,
            client_id: info.data.id,
        });
        Ok(())
    }

    /// Relogin triggered by a 401, rate-limited by the configured cooldown.
    /// The call that observed the 401 is not retried; it fails and the next
    /// cycle runs with the fresh session.
    async fn relogin_after_401(&self) -> Result<(), BrokerError> {
        let mut last_login = self.relogin_gate.lock().await;
        let cooldown = Duration::from_secs(self.config.relogin_cooldown_secs);
        if last_login.is_some_and(|t| t.elapsed() < cooldown) {
            return Ok(());
        }
        warn!("session expired, logging in again");
        self.login_inner()
            .await
            .map_err(|e| BrokerError::Relogin {
                source: Box::new(e),
            })?;
        *last_login = Some(Instant::now());
        Ok(())
    }

    /// Send a request against a secure endpoint. A 401 triggers the guarded
    /// relogin before the status error is returned; any other non-success
    /// status maps to [`BrokerError::Status`].
    async fn send_checked(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BrokerError> {
        let resp = request.send().await?;
        let code = resp.status().as_u16();
        if code == 401 {
            self.relogin_after_401().await?;
            return Err(BrokerError::Status { code });
        }
        if !resp.status().is_success() {
            return Err(BrokerError::Status { code });
        }
        Ok(resp)
    }

    fn current_session(&self) -> Result<Session, BrokerError> {
        let session = self.session.read().unwrap_or_else(PoisonError::into_inner);
        session.clone().ok_or(BrokerError::Unauthenticated)
    }

    // --- background loops ---

    /// Log in, open the quote stream, and spawn the sync loops. Replaces any
    /// loops left over from a previous `start`.
    pub async fn start(self: &Arc<Self>) -> Result<(), BrokerError> {
        self.login().await?;
        let session = self.current_session()?;

        let mut stream_config = self.config.stream.clone();
        stream_config.user_token = session.client_id;
        let stream = Arc::new(QuoteStreamClient::new(stream_config));
        stream.start().await?;
        {
            let mut slot = self.stream.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(old) = slot.replace(Arc::clone(&stream)) {
                old.stop();
            }
        }

        let mut handles = Vec::with_capacity(3);

        let client = Arc::clone(self);
        let period = Duration::from_millis(self.config.update_period_ms.max(1));
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // skip the immediate first tick
            loop {
                interval.tick().await;
                if let Err(e) = client.sync_once().await {
                    error!("delta sync failed: {e}");
                }
            }
        }));

        let client = Arc::clone(self);
        let period = Duration::from_secs(self.config.history_period_secs.max(1));
        handles.push(tokio::spawn(async move {
            // the first pass loads the whole history so lot accounting
            // starts complete
            match client.sync_history(NaiveDate::default()).await {
                Ok(count) => info!("transaction history primed with {count} records"),
                Err(e) => error!("initial transaction sync failed: {e}"),
            }
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // skip the immediate first tick
            loop {
                interval.tick().await;
                // the endpoint is day-granular; re-fetch a few days back and
                // let the ledger deduplicate the overlap
                let from = Local::now()
                    .date_naive()
                    .checked_sub_days(Days::new(3))
                    .unwrap_or_default();
                if let Err(e) = client.sync_history(from).await {
                    error!("transaction sync failed: {e}");
                }
            }
        }));

        let client = Arc::clone(self);
        let period = Duration::from_secs(self.config.product_refresh_secs.max(1));
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // skip the immediate first tick
            loop {
                interval.tick().await;
                let stale = client.products.take_pending();
                if stale.is_empty() {
                    continue;
                }
                match client.fetch_products(&stale).await {
                    Ok(fresh) => client.products.insert(fresh),
                    Err(e) => error!("product refresh failed: {e}"),
                }
            }
        }));

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for old in tasks.drain(..) {
            old.abort();
        }
        *tasks = handles;
        Ok(())
    }

    /// Abort every sync loop and the quote-stream poll task. The mirrored
    /// state stays readable.
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in tasks.drain(..) {
            handle.abort();
        }
        drop(tasks);
        let stream = self.stream.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(stream) = stream.as_ref() {
            stream.stop();
        }
    }

    // --- delta sync ---

    /// Fetch one delta snapshot and fold it into the caches.
    ///
    /// Additions are applied before updates, removals last, so an id that
    /// appears twice in one batch ends up removed. The balance snapshot is
    /// replaced only when its cursor moved and the section is non-empty;
    /// cursors advance even when individual records were skipped as
    /// malformed.
    pub async fn sync_once(&self) -> Result<(), BrokerError> {
        let session = self.current_session()?;
        let cursors = {
            let guard = self.cursors.lock().unwrap_or_else(PoisonError::into_inner);
            *guard
        };
        let url = format!(
            "{}/trading/secure/v5/update/{};jsessionid={}",
            self.config.base_url, session.account_id, session.session_id
        );
        let request = self.http.get(&url).query(&[
            ("orders", cursors.orders),
            ("portfolio", cursors.portfolio),
            ("totalPortfolio", cursors.total_portfolio),
        ]);
        let resp = self.send_checked(request).await?;
        let update: UpdateResponse = resp.json().await?;

        let orders = sync::decode_orders(&update.orders);
        self.orders.add(orders.added);
        self.orders.update(&orders.updated);
        self.orders.remove(&orders.removed);

        let positions = sync::decode_positions(&update.portfolio);
        self.positions.add(positions.added);
        self.positions.update(&positions.updated);
        self.positions.remove(&positions.removed);

        if update.total_portfolio.last_updated != cursors.total_portfolio {
            if let Some(balance) =
                sync::decode_balance(&update.total_portfolio, &self.config.base_currency)
            {
                self.balance.set(balance);
            }
        }

        // A section the server omitted decodes with cursor 0; keep the
        // previous cursor for it instead of rewinding.
        let mut guard = self.cursors.lock().unwrap_or_else(PoisonError::into_inner);
        if update.orders.last_updated != 0 {
            guard.orders = update.orders.last_updated;
        }
        if update.portfolio.last_updated != 0 {
            guard.portfolio = update.portfolio.last_updated;
        }
        if update.total_portfolio.last_updated != 0 {
            guard.total_portfolio = update.total_portfolio.last_updated;
        }
        Ok(())
    }

    // --- transaction history ---

    /// Fetch the transaction report for a date window. Malformed records are
    /// skipped and logged, the rest of the report still decodes.
    pub async fn fetch_transactions(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Transaction>, BrokerError> {
        let session = self.current_session()?;
        let url = format!("{}/reporting/secure/v4/transactions", self.config.base_url);
        let request = self.http.get(&url).query(&[
            ("fromDate", from.format("%d/%m/%Y").to_string()),
            ("toDate", to.format("%d/%m/%Y").to_string()),
            ("intAccount", session.account_id.to_string()),
            ("sessionId", session.session_id),
        ]);
        let resp = self.send_checked(request).await?;
        let body: TransactionsResponse = resp.json().await?;

        let mut batch = Vec::with_capacity(body.data.len());
        for raw in body.data {
            match serde_json::from_value::<Transaction>(raw) {
                Ok(transaction) => batch.push(transaction),
                Err(e) => warn!("skipping malformed transaction record: {e}"),
            }
        }
        Ok(batch)
    }

    /// Fetch transactions from `from` up to today and merge them into the
    /// ledger. Returns the fetched record count.
    pub async fn sync_history(&self, from: NaiveDate) -> Result<usize, BrokerError> {
        let to = Local::now().date_naive();
        let batch = self.fetch_transactions(from, to).await?;
        let count = batch.len();
        self.ledger.merge(batch);
        Ok(count)
    }

    // --- order entry ---

    /// Place an order: a check call yields a confirmation id and the
    /// projected fees, then the confirm call turns the confirmation into the
    /// broker-assigned order id.
    pub async fn place_order(&self, order: &OrderRequest) -> Result<PlacedOrder, BrokerError> {
        let session = self.current_session()?;
        let auth = [
            ("intAccount", session.account_id.to_string()),
            ("sessionId", session.session_id.clone()),
        ];

        let check_url = format!(
            "{}/trading/secure/v5/checkOrder;jsessionid={}",
            self.config.base_url, session.session_id
        );
        let request = self.http.post(&check_url).query(&auth).json(order);
        let resp = self.send_checked(request).await?;
        let check: CheckOrderResponse = resp.json().await?;

        let confirm_url = format!(
            "{}/trading/secure/v5/order/{};jsessionid={}",
            self.config.base_url, check.data.confirmation_id, session.session_id
        );
        let request = self.http.post(&confirm_url).query(&auth).json(order);
        let resp = self.send_checked(request).await?;
        let confirm: ConfirmOrderResponse = resp.json().await?;
        info!("order placed: {}", confirm.data.order_id);
        Ok(PlacedOrder {
            order_id: confirm.data.order_id,
            projected_fees: check.data.transaction_fees,
            projected_taxes: check.data.transaction_taxes,
        })
    }

    /// Cancel a pending order by its broker-assigned id.
    pub async fn cancel_order(&self, order_id: &str) -> Result<(), BrokerError> {
        let session = self.current_session()?;
        let url = format!(
            "{}/trading/secure/v5/order/{};jsessionid={}",
            self.config.base_url, order_id, session.session_id
        );
        let request = self.http.delete(&url).query(&[
            ("intAccount", session.account_id.to_string()),
            ("sessionId", session.session_id.clone()),
        ]);
        self.send_checked(request).await?;
        info!("order cancelled: {order_id}");
        Ok(())
    }

    // --- product metadata ---

    /// Metadata for a set of product ids. Fresh entries come from the cache;
    /// unknown ids are fetched inline; stale entries are served as-is and
    /// refreshed by the background loop.
    pub async fn products_by_ids(&self, ids: &[String]) -> Result<Vec<Product>, BrokerError> {
        let (mut found, missing) = self.products.split_fresh(ids);
        if !missing.is_empty() {
            let fetched = self.fetch_products(&missing).await?;
            found.extend(fetched.iter().cloned());
            self.products.insert(fetched);
        }
        Ok(found)
    }

    async fn fetch_products(&self, ids: &[String]) -> Result<Vec<Product>, BrokerError> {
        let session = self.current_session()?;
        let url = format!(
            "{}/product_search/secure/v5/products/info",
            self.config.base_url
        );
        let request = self
            .http
            .post(&url)
            .query(&[
                ("intAccount", session.account_id.to_string()),
                ("sessionId", session.session_id),
            ])
            .json(&ids);
        let resp = self.send_checked(request).await?;
        let body: ProductsInfoResponse = resp.json().await?;
        Ok(body.data.into_values().collect())
    }

    /// Free-text product search, optionally narrowed to one product type.
    pub async fn search_products(
        &self,
        options: &SearchOptions,
    ) -> Result<Vec<Product>, BrokerError> {
        let session = self.current_session()?;
        let url = format!(
            "{}/product_search/secure/v5/products/lookup",
            self.config.base_url
        );
        let mut query = vec![
            ("searchText", options.search_text.clone()),
            ("limit", options.limit.to_string()),
            ("intAccount", session.account_id.to_string()),
            ("sessionId", session.session_id),
        ];
        if let Some(product_type) = options.product_type {
            query.push(("productTypeId", (product_type as i64).to_string()));
        }
        let request = self.http.get(&url).query(&query);
        let resp = self.send_checked(request).await?;
        let body: SearchResponse = resp.json().await?;
        Ok(body.products)
    }

    // --- quote stream ---

    fn stream_client(&self) -> Result<Arc<QuoteStreamClient>, BrokerError> {
        let stream = self.stream.read().unwrap_or_else(PoisonError::into_inner);
        stream
            .clone()
            .ok_or_else(|| BrokerError::Session("quote stream not started".to_string()))
    }

    /// Stream the tracked quote fields for the given instruments.
    pub async fn subscribe_quotes(&self, issue_ids: &[String]) -> Result<(), BrokerError> {
        self.stream_client()?.subscribe(issue_ids).await
    }

    /// Stop streaming the given instruments.
    pub async fn unsubscribe_quotes(&self, issue_ids: &[String]) -> Result<(), BrokerError> {
        self.stream_client()?.unsubscribe(issue_ids).await
    }

    /// Latest quote for one instrument; fields that have not streamed yet
    /// are their zero value.
    pub fn get_quote(&self, issue_id: &str) -> Result<ProductQuote, BrokerError> {
        Ok(self.stream_client()?.get_quote(issue_id))
    }

    // --- mirrored reads ---

    /// Pending orders for one product.
    pub fn pending_orders(&self, product_id: i64) -> Vec<Order> {
        self.orders.get(&product_id)
    }

    /// All pending orders, in unspecified order.
    pub fn all_pending_orders(&self) -> Vec<Order> {
        self.orders.snapshot()
    }

    /// Current open position for one product, if any.
    pub fn position(&self, product_id: &str) -> Option<Position> {
        self.positions.get(&product_id.to_string()).into_iter().next()
    }

    /// All current positions, in unspecified order.
    pub fn positions(&self) -> Vec<Position> {
        self.positions.snapshot()
    }

    /// Latest balance snapshot.
    pub fn balance(&self) -> Balance {
        self.balance.get()
    }

    /// All merged transactions, date-sorted.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.ledger.transactions()
    }

    /// All transaction-derived lots, open and closed.
    pub fn historical_positions(&self) -> Vec<HistoricalPosition> {
        self.ledger.historical_positions()
    }

    /// All lots for one product, oldest first.
    pub fn positions_for_product(&self, product_id: i64) -> Vec<HistoricalPosition> {
        self.ledger.positions_for_product(product_id)
    }

    /// The currently open lot for one product, if any.
    pub fn open_historical_position(&self, product_id: i64) -> Option<HistoricalPosition> {
        self.ledger.open_position_for_product(product_id)
    }
}
