//! Scripted [`Broker`] for testing.
//!
//! Every call is appended to a log with its (tokio, so pausable) timestamp.
//! Behavior is configured through builder methods before the broker is
//! shared; counters are atomics so tests can assert after the fact.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::domain::{
    Balances, CancelReceipt, Candle, CurrencyPair, OpenOrderStatus, OrderId, OrderPlacement,
    Tickers,
};
use crate::error::ExchangeError;
use crate::exchange::{Broker, Exchange};
use crate::runtime::ResourcePool;

/// One recorded broker call.
#[derive(Debug, Clone)]
pub struct BrokerCall {
    pub operation: &'static str,
    pub at: Instant,
}

/// A broker whose answers are scripted up front.
///
/// - tickers: served in order; the last script entry repeats forever
/// - errors: scripted ticker and sell errors are returned once each, chart
///   errors on every fetch for their pair
/// - placements: the first `n` buys (or sells) answer "not placed"
/// - open orders: close after `fill_after` status polls, or never
/// - cancels: answer with the configured result
pub struct MockBroker {
    name: String,
    requests_per_second: u32,
    fee: f64,
    configured: bool,
    latency: Duration,
    tickers: Mutex<VecDeque<Tickers>>,
    ticker_failures: AtomicU32,
    ticker_errors: Mutex<VecDeque<ExchangeError>>,
    candles: Mutex<BTreeMap<CurrencyPair, Vec<Candle>>>,
    chart_errors: Mutex<BTreeMap<CurrencyPair, ExchangeError>>,
    buy_failures: AtomicU32,
    sell_failures: AtomicU32,
    sell_errors: Mutex<VecDeque<ExchangeError>>,
    fill_after: Option<u32>,
    partially_filled: bool,
    cancel_result: Mutex<Result<CancelReceipt, ExchangeError>>,
    balances: Mutex<Balances>,
    polls: Mutex<HashMap<OrderId, u32>>,
    next_order: AtomicU32,
    calls: Mutex<Vec<BrokerCall>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            name: "mock".into(),
            requests_per_second: 1_000,
            fee: 0.0,
            configured: true,
            latency: Duration::ZERO,
            tickers: Mutex::new(VecDeque::new()),
            ticker_failures: AtomicU32::new(0),
            ticker_errors: Mutex::new(VecDeque::new()),
            candles: Mutex::new(BTreeMap::new()),
            chart_errors: Mutex::new(BTreeMap::new()),
            buy_failures: AtomicU32::new(0),
            sell_failures: AtomicU32::new(0),
            sell_errors: Mutex::new(VecDeque::new()),
            fill_after: Some(0),
            partially_filled: false,
            cancel_result: Mutex::new(Ok(CancelReceipt { canceled: true })),
            balances: Mutex::new(Balances::new()),
            polls: Mutex::new(HashMap::new()),
            next_order: AtomicU32::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_rps(mut self, requests_per_second: u32) -> Self {
        self.requests_per_second = requests_per_second;
        self
    }

    pub fn with_fee(mut self, fee: f64) -> Self {
        self.fee = fee;
        self
    }

    /// Make `check_config` fail.
    pub fn without_credentials(mut self) -> Self {
        self.configured = false;
        self
    }

    /// Simulated duration of every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_tickers(self, script: Vec<Tickers>) -> Self {
        *self.tickers.lock() = script.into();
        self
    }

    /// The first `n` ticker polls fail with a transport error.
    pub fn with_ticker_failures(self, n: u32) -> Self {
        self.ticker_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Ticker polls return these errors, one per poll, before any script.
    pub fn with_ticker_errors(self, errors: Vec<ExchangeError>) -> Self {
        *self.ticker_errors.lock() = errors.into();
        self
    }

    pub fn with_candles(self, pair: CurrencyPair, candles: Vec<Candle>) -> Self {
        self.candles.lock().insert(pair, candles);
        self
    }

    /// Every chart fetch for `pair` fails with `error`.
    pub fn with_chart_error(self, pair: CurrencyPair, error: ExchangeError) -> Self {
        self.chart_errors.lock().insert(pair, error);
        self
    }

    /// The first `n` buy placements answer "not placed".
    pub fn with_buy_failures(self, n: u32) -> Self {
        self.buy_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_sell_failures(self, n: u32) -> Self {
        self.sell_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Sell placements return these errors, one per call, before placing.
    pub fn with_sell_errors(self, errors: Vec<ExchangeError>) -> Self {
        *self.sell_errors.lock() = errors.into();
        self
    }

    /// Orders close after this many status polls; `None` keeps them open.
    pub fn with_fill_after(mut self, polls: Option<u32>) -> Self {
        self.fill_after = polls;
        self
    }

    pub fn with_partially_filled(mut self, partially_filled: bool) -> Self {
        self.partially_filled = partially_filled;
        self
    }

    pub fn with_cancel_result(self, result: Result<CancelReceipt, ExchangeError>) -> Self {
        *self.cancel_result.lock() = result;
        self
    }

    pub fn with_balances(self, balances: Balances) -> Self {
        *self.balances.lock() = balances;
        self
    }

    /// Wrap in an [`Exchange`] with a small pool.
    pub fn into_exchange(self) -> (Arc<Self>, Exchange) {
        let broker = Arc::new(self);
        let exchange = Exchange::new(broker.clone(), ResourcePool::new(1, 4));
        (broker, exchange)
    }

    pub fn calls(&self) -> Vec<BrokerCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Timestamps of every call to `operation`, in call order.
    pub fn call_times(&self, operation: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.operation == operation)
            .map(|c| c.at)
            .collect()
    }

    async fn record(&self, operation: &'static str) {
        self.calls.lock().push(BrokerCall {
            operation,
            at: Instant::now(),
        });
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn place(&self, failures: &AtomicU32) -> OrderPlacement {
        if Self::take_failure(failures) {
            return OrderPlacement::NotPlaced {
                reason: "scripted refusal".into(),
            };
        }
        let n = self.next_order.fetch_add(1, Ordering::SeqCst);
        OrderPlacement::Placed(OrderId::new(format!("order-{n}")))
    }
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for MockBroker {
    fn name(&self) -> &str {
        &self.name
    }

    fn requests_per_second_limit(&self) -> u32 {
        self.requests_per_second
    }

    fn fee(&self) -> f64 {
        self.fee
    }

    fn check_config(&self) -> bool {
        self.configured
    }

    async fn get_tickers(&self) -> Result<Tickers, ExchangeError> {
        self.record("get_tickers").await;
        if Self::take_failure(&self.ticker_failures) {
            return Err(ExchangeError::Transport("scripted ticker failure".into()));
        }
        if let Some(err) = self.ticker_errors.lock().pop_front() {
            return Err(err);
        }
        let mut script = self.tickers.lock();
        let tickers = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        Ok(tickers.unwrap_or_default())
    }

    async fn get_chart_data(
        &self,
        pair: &CurrencyPair,
        _start: i64,
        _end: i64,
        _period_secs: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.record("get_chart_data").await;
        if let Some(err) = self.chart_errors.lock().get(pair).cloned() {
            return Err(err);
        }
        Ok(self.candles.lock().get(pair).cloned().unwrap_or_default())
    }

    async fn get_open_order(&self, order_id: &OrderId) -> Result<OpenOrderStatus, ExchangeError> {
        self.record("get_open_order").await;
        let mut polls = self.polls.lock();
        let seen = polls.entry(order_id.clone()).or_insert(0);
        let closed = self.fill_after.is_some_and(|n| *seen >= n);
        *seen += 1;
        Ok(OpenOrderStatus {
            order_id: order_id.clone(),
            closed,
            partially_filled: !closed && self.partially_filled,
        })
    }

    async fn place_buy_order(
        &self,
        _pair: &CurrencyPair,
        _quantity: f64,
        _rate: f64,
    ) -> Result<OrderPlacement, ExchangeError> {
        self.record("place_buy_order").await;
        Ok(self.place(&self.buy_failures))
    }

    async fn place_sell_order(
        &self,
        _pair: &CurrencyPair,
        _quantity: f64,
        _rate: f64,
    ) -> Result<OrderPlacement, ExchangeError> {
        self.record("place_sell_order").await;
        if let Some(err) = self.sell_errors.lock().pop_front() {
            return Err(err);
        }
        Ok(self.place(&self.sell_failures))
    }

    async fn cancel_open_order(&self, _order_id: &OrderId) -> Result<CancelReceipt, ExchangeError> {
        self.record("cancel_open_order").await;
        self.cancel_result.lock().clone()
    }

    async fn get_balances(&self) -> Result<Balances, ExchangeError> {
        self.record("get_balances").await;
        Ok(self.balances.lock().clone())
    }
}
