//! Live-ticker producer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::hub::{ListenerHub, Subscription};
use super::producer_backoff;
use crate::domain::{CurrencyPair, Tickers};
use crate::error::ExchangeError;
use crate::exchange::{retry_read, Exchange};
use crate::strategy::{SharedTickerIndicator, TickerIndicatorHandle, TickerStrategy};

/// Indicators updated by one ticker poll, in pair order.
pub type SampleBatch = Arc<Vec<SharedTickerIndicator>>;

/// Polls every ticker, feeds each pair's indicator and broadcasts the batch.
///
/// No sleep between polls: the scheduler's rate limit on `get_tickers` is
/// the cadence. One indicator exists per pair for the monitor's lifetime.
pub struct TickerMonitor {
    exchange: Exchange,
    strategy: TickerStrategy,
    indicators: DashMap<CurrencyPair, SharedTickerIndicator>,
    hub: Arc<ListenerHub<SampleBatch>>,
    polls: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TickerMonitor {
    pub fn new(exchange: Exchange, strategy: TickerStrategy) -> Arc<Self> {
        Arc::new(Self {
            exchange,
            strategy,
            indicators: DashMap::new(),
            hub: ListenerHub::new(),
            polls: AtomicU64::new(0),
            task: Mutex::new(None),
        })
    }

    #[must_use]
    pub const fn strategy(&self) -> TickerStrategy {
        self.strategy
    }

    #[must_use]
    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    #[must_use]
    pub fn hub(&self) -> &Arc<ListenerHub<SampleBatch>> {
        &self.hub
    }

    pub fn subscribe(&self) -> Subscription<SampleBatch> {
        self.hub.subscribe()
    }

    #[must_use]
    pub fn indicator(&self, pair: &CurrencyPair) -> Option<SharedTickerIndicator> {
        self.indicators.get(pair).map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn indicator_count(&self) -> usize {
        self.indicators.len()
    }

    #[must_use]
    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    /// Feed one poll's tickers into their indicators, creating missing ones.
    pub fn ingest(&self, tickers: Tickers) -> SampleBatch {
        let rps = self.exchange.requests_per_second_limit();
        let mut batch = Vec::with_capacity(tickers.len());

        for (pair, ticker) in tickers {
            let handle = Arc::clone(
                self.indicators
                    .entry(pair.clone())
                    .or_insert_with(|| {
                        debug!(pair = %pair, strategy = self.strategy.name(), "Creating indicator");
                        Arc::new(TickerIndicatorHandle::new(pair, self.strategy.create(rps)))
                    })
                    .value(),
            );
            handle.add_sample(ticker);
            batch.push(handle);
        }

        self.polls.fetch_add(1, Ordering::Relaxed);
        Arc::new(batch)
    }

    /// Run one poll and broadcast its batch.
    pub async fn poll_once(&self) -> Result<SampleBatch, ExchangeError> {
        let tickers = retry_read(self.exchange.name(), "get_tickers", || {
            self.exchange.get_tickers()
        })
        .await?;
        let batch = self.ingest(tickers);
        self.hub.broadcast(Arc::clone(&batch));
        Ok(batch)
    }

    /// Start the polling loop. Calling it again is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }
        let monitor = Arc::clone(self);
        *task = Some(tokio::spawn(async move { monitor.run().await }));
    }

    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.hub.close();
    }

    async fn run(&self) {
        info!(
            exchange = %self.exchange.name(),
            strategy = self.strategy.name(),
            "Ticker monitor started"
        );
        let mut backoff = producer_backoff();
        loop {
            match self.poll_once().await {
                Ok(_) => backoff.reset(),
                Err(ExchangeError::MonitorStopped) => {
                    error!(exchange = %self.exchange.name(), "Scheduler stopped, ticker monitor exiting");
                    break;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        exchange = %self.exchange.name(),
                        error = %e,
                        attempt = backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Ticker poll failed, retrying after delay"
                    );
                    sleep(delay).await;
                }
            }
        }
        self.hub.close();
    }
}
