//! Candle-history producer.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::hub::{ListenerHub, Subscription};
use super::producer_backoff;
use crate::domain::CurrencyPair;
use crate::error::ExchangeError;
use crate::exchange::{retry_read, Exchange};
use crate::runtime::ResourcePool;
use crate::strategy::{HistoryIndicatorHandle, HistoryStrategy, SharedHistoryIndicator};

#[derive(Debug, Clone)]
pub enum HistoryEvent {
    /// Every pair whose buy weight was positive in one cycle, in pair order.
    BuyTrigger(Arc<Vec<SharedHistoryIndicator>>),
    /// A single pair whose sell weight turned positive.
    SellTrigger(SharedHistoryIndicator),
}

/// What one analysis cycle produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub analyzed: usize,
    pub buy_candidates: usize,
    pub sell_triggers: usize,
    /// Pairs whose chart could not be fetched this cycle.
    pub skipped: usize,
}

/// Re-analyzes every pair's recent candles on each cycle.
///
/// Chart requests for all pairs are issued together and each response is
/// analyzed on the heavy pool as it arrives. Sell triggers go out
/// immediately; buy candidates are batched until the cycle completes.
pub struct HistoryMonitor {
    exchange: Exchange,
    strategy: HistoryStrategy,
    pool: ResourcePool,
    indicators: RwLock<Vec<SharedHistoryIndicator>>,
    hub: Arc<ListenerHub<HistoryEvent>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HistoryMonitor {
    pub fn new(exchange: Exchange, strategy: HistoryStrategy, pool: ResourcePool) -> Arc<Self> {
        Arc::new(Self {
            exchange,
            strategy,
            pool,
            indicators: RwLock::new(Vec::new()),
            hub: ListenerHub::new(),
            task: Mutex::new(None),
        })
    }

    #[must_use]
    pub const fn strategy(&self) -> HistoryStrategy {
        self.strategy
    }

    #[must_use]
    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    pub fn subscribe(&self) -> Subscription<HistoryEvent> {
        self.hub.subscribe()
    }

    #[must_use]
    pub fn hub(&self) -> &Arc<ListenerHub<HistoryEvent>> {
        &self.hub
    }

    #[must_use]
    pub fn indicators(&self) -> Vec<SharedHistoryIndicator> {
        self.indicators.read().clone()
    }

    /// Create one indicator per listed pair. Only the first call has effect.
    pub async fn enumerate_pairs(&self) -> Result<usize, ExchangeError> {
        if !self.indicators.read().is_empty() {
            return Ok(self.indicators.read().len());
        }
        let tickers = retry_read(self.exchange.name(), "get_tickers", || {
            self.exchange.get_tickers()
        })
        .await?;

        let mut indicators = self.indicators.write();
        if indicators.is_empty() {
            indicators.extend(
                tickers
                    .into_keys()
                    .map(|pair| Arc::new(HistoryIndicatorHandle::new(pair, self.strategy.create()))),
            );
            debug!(exchange = %self.exchange.name(), pairs = indicators.len(), "History indicators created");
        }
        Ok(indicators.len())
    }

    /// Fetch prices, analyze every pair once and broadcast the results.
    pub async fn run_cycle(&self) -> Result<CycleReport, ExchangeError> {
        let tickers = retry_read(self.exchange.name(), "get_tickers", || {
            self.exchange.get_tickers()
        })
        .await?;

        let end = Utc::now().timestamp();
        let start = end - self.strategy.interval_secs();
        let period = self.strategy.candle_period_secs();

        let work = self.indicators().into_iter().filter_map(|indicator| {
            let last_price = tickers.get(indicator.pair())?.last;
            Some(self.analyze_pair(indicator, start, end, period, last_price))
        });
        let outcomes = join_all(work).await;

        let mut report = CycleReport::default();
        let mut buys = Vec::new();
        for outcome in outcomes {
            let (indicator, buy, sell) = match outcome {
                Ok(analyzed) => analyzed,
                Err((_, ExchangeError::MonitorStopped)) => return Err(ExchangeError::MonitorStopped),
                Err((pair, e)) => {
                    warn!(pair = %pair, error = %e, "Chart fetch failed, skipping pair this cycle");
                    report.skipped += 1;
                    continue;
                }
            };
            report.analyzed += 1;
            if sell {
                report.sell_triggers += 1;
            }
            if buy {
                buys.push(indicator);
            }
        }

        report.buy_candidates = buys.len();
        if !buys.is_empty() {
            self.hub.broadcast(HistoryEvent::BuyTrigger(Arc::new(buys)));
            debug!(exchange = %self.exchange.name(), candidates = report.buy_candidates, "Buy trigger broadcast");
        }
        Ok(report)
    }

    async fn analyze_pair(
        &self,
        indicator: SharedHistoryIndicator,
        start: i64,
        end: i64,
        period: u32,
        last_price: f64,
    ) -> Result<(SharedHistoryIndicator, bool, bool), (CurrencyPair, ExchangeError)> {
        let pair = indicator.pair().clone();
        let candles = match retry_read(self.exchange.name(), "get_chart_data", || {
            self.exchange.get_chart_data(&pair, start, end, period)
        })
        .await
        {
            Ok(candles) => candles,
            Err(e) => return Err((pair, e)),
        };

        let handle = Arc::clone(&indicator);
        let (buy_weight, sell_weight) = match self
            .pool
            .run_heavy(move || handle.analyze(&candles, last_price))
            .await
        {
            Ok(weights) => weights,
            Err(e) => {
                warn!(pair = %pair, error = %e, "History analysis failed");
                (0.0, 0.0)
            }
        };

        let sell = sell_weight > 0.0;
        if sell {
            self.hub.broadcast(HistoryEvent::SellTrigger(Arc::clone(&indicator)));
        }
        Ok((indicator, buy_weight > 0.0, sell))
    }

    /// Start the analysis loop. Calling it again is a no-op.
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
            "History monitor started"
        );
        let mut backoff = producer_backoff();
        loop {
            let outcome = match self.enumerate_pairs().await {
                Ok(_) => self.run_cycle().await.map(|_| ()),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(()) => backoff.reset(),
                Err(ExchangeError::MonitorStopped) => {
                    error!(exchange = %self.exchange.name(), "Scheduler stopped, history monitor exiting");
                    break;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        exchange = %self.exchange.name(),
                        error = %e,
                        attempt = backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "History cycle failed, retrying after delay"
                    );
                    sleep(delay).await;
                }
            }
        }
        self.hub.close();
    }
}
