//! The live-ticker trading state machine.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::execution::{ExecutionMode, OrderExecution};
use super::paper::PaperExecution;
use super::signal::LiveSignal;
use super::state::{StateTracker, TradeState};
use super::supervisor::supervise;
use crate::domain::{Balances, Currency, Trade};
use crate::error::TradingError;
use crate::market::TickerMonitor;
use crate::strategy::SharedTickerIndicator;

const TICKER_SOURCE: &str = "ticker monitor";

/// Knobs shared by both state machines.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorSettings {
    /// Only pairs with this base currency are bought. `None` allows any.
    pub base_currency: Option<Currency>,
    /// Overrides the strategy's priming sample count.
    pub prime_samples: Option<usize>,
    pub restart_base: Duration,
    pub restart_max: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            base_currency: Some(Currency::new("BTC")),
            prime_samples: None,
            restart_base: Duration::from_secs(1),
            restart_max: Duration::from_secs(60),
        }
    }
}

/// Pick the buy candidate from one sample batch.
///
/// A candidate must signal a buy, trade from a base currency that is held,
/// and match `base_currency` when one is given. The highest candidacy
/// weight wins; ties go to the earliest entry in the batch.
#[must_use]
pub fn select_candidate(
    batch: &[SharedTickerIndicator],
    balances: &Balances,
    base_currency: Option<&Currency>,
) -> Option<SharedTickerIndicator> {
    let mut best: Option<(f64, &SharedTickerIndicator)> = None;

    for indicator in batch {
        let pair = indicator.pair();
        if base_currency.is_some_and(|base| pair.base() != base) {
            continue;
        }
        if balances.amount(pair.base()) <= 0.0 {
            continue;
        }
        let signal = indicator.signal();
        if !signal.should_buy {
            continue;
        }
        if best.map_or(true, |(weight, _)| signal.candidacy_weight > weight) {
            best = Some((signal.candidacy_weight, indicator));
        }
    }

    best.map(|(_, indicator)| Arc::clone(indicator))
}

/// A filled buy that has not been sold yet.
#[derive(Clone)]
struct Position {
    indicator: SharedTickerIndicator,
    bought: Trade,
    /// Balances before the buy, for the settlement report.
    balances: Balances,
}

/// Buys the best live candidate, holds it until its indicator says sell,
/// settles, and starts over.
///
/// A position survives a session restart: the next session goes straight
/// back to waiting for its sell signal instead of buying again.
pub struct AlgExecutor<X> {
    monitor: Arc<TickerMonitor>,
    execution: X,
    settings: ExecutorSettings,
    tracker: StateTracker,
    held: Mutex<Option<Position>>,
}

/// The live-ticker state machine trading on paper.
pub type AlgTester = AlgExecutor<PaperExecution>;

impl<X: OrderExecution> AlgExecutor<X> {
    pub fn new(monitor: Arc<TickerMonitor>, execution: X, settings: ExecutorSettings) -> Self {
        Self {
            monitor,
            execution,
            settings,
            tracker: StateTracker::new(),
            held: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    #[must_use]
    pub fn execution(&self) -> &X {
        &self.execution
    }

    #[must_use]
    pub fn monitor(&self) -> &Arc<TickerMonitor> {
        &self.monitor
    }

    /// Verify the exchange, prime the indicators, then trade until a fatal
    /// error. Recoverable failures restart the trading session.
    pub async fn run(&self) -> Result<(), TradingError> {
        self.tracker.set(TradeState::Init);
        let exchange = self.monitor.exchange();
        info!(
            config = true,
            exchange = %exchange.name(),
            strategy = self.monitor.strategy().name(),
            mode = self.execution.mode().as_str(),
            base_currency = ?self.settings.base_currency.as_ref().map(Currency::name),
            "Starting trading"
        );

        if self.execution.mode() == ExecutionMode::Live && !exchange.check_config() {
            self.tracker.set(TradeState::Stopped);
            error!(exchange = %exchange.name(), "Exchange configuration is empty or invalid");
            return Err(TradingError::Misconfigured {
                exchange: exchange.name().to_string(),
            });
        }

        if let Err(e) = self.prime().await {
            self.tracker.set(TradeState::Stopped);
            return Err(e);
        }

        Err(supervise(
            "alg_executor",
            &self.tracker,
            self.settings.restart_base,
            self.settings.restart_max,
            || self.session(),
        )
        .await)
    }

    /// Run on a new task.
    pub fn spawn(self) -> ExecutorHandle
    where
        X: 'static,
    {
        let tracker = self.tracker.clone();
        let task = tokio::spawn(async move { self.run().await });
        ExecutorHandle::new(task, tracker)
    }

    /// Start the producer and wait until every indicator has a full window.
    async fn prime(&self) -> Result<(), TradingError> {
        let rps = self.monitor.exchange().requests_per_second_limit();
        let needed = self
            .settings
            .prime_samples
            .unwrap_or_else(|| self.monitor.strategy().amount_of_samples(rps));

        let mut batches = self.monitor.subscribe();
        self.monitor.start();

        info!(samples = needed, "Priming indicators");
        for seen in 1..=needed {
            if batches.recv().await.is_none() {
                return Err(TradingError::SignalsClosed {
                    source_name: TICKER_SOURCE,
                });
            }
            debug!(seen, needed, "Priming sample received");
        }
        info!(samples = needed, pairs = self.monitor.indicator_count(), "Indicators primed");
        Ok(())
    }

    async fn session(&self) -> Result<Infallible, TradingError> {
        let held = self.held.lock().clone();
        let mut balances = match held {
            Some(position) => {
                warn!(
                    pair = %position.indicator.pair(),
                    rate = position.bought.rate,
                    quantity = position.bought.quantity,
                    "Resuming held position"
                );
                self.close_position(&position).await?
            }
            None => {
                self.tracker.set(TradeState::FetchBalances);
                self.execution.balances().await?
            }
        };
        loop {
            balances = self.run_round(balances).await?;
        }
    }

    /// One buy-hold-sell-settle cycle. Returns the balances to size the
    /// next buy with.
    async fn run_round(&self, balances: Balances) -> Result<Balances, TradingError> {
        let candidate = self.await_candidate(&balances).await?;
        let pair = candidate.pair().clone();
        info!(
            pair = %pair,
            weight = candidate.candidacy_weight(),
            price = ?candidate.last_price(),
            "Buy candidate selected"
        );

        let signal = LiveSignal::new(Arc::clone(&candidate));
        let Some(bought) = self.execution.buy(&signal, &balances, &self.tracker).await? else {
            self.tracker.set(TradeState::BuyAbandoned);
            info!(pair = %pair, "Buy missed");
            return Ok(balances);
        };
        self.tracker.set(TradeState::BuyFilled);
        info!(pair = %pair, rate = bought.rate, quantity = bought.quantity, "Bought");

        let position = Position {
            indicator: candidate,
            bought,
            balances,
        };
        *self.held.lock() = Some(position.clone());
        self.close_position(&position).await
    }

    /// Hold until the indicator says sell, sell, and settle.
    async fn close_position(&self, position: &Position) -> Result<Balances, TradingError> {
        let Position {
            indicator,
            bought,
            balances,
        } = position;
        let pair = indicator.pair();
        let signal = LiveSignal::new(Arc::clone(indicator));
        let fee = self.monitor.exchange().fee();

        let sold = loop {
            self.await_sell_signal(indicator, bought.rate, fee).await?;
            if let Some(sold) = self.execution.sell(&signal, bought, &self.tracker).await? {
                break sold;
            }
        };
        *self.held.lock() = None;
        self.tracker.set(TradeState::SellFilled);
        info!(pair = %pair, rate = sold.rate, quantity = sold.quantity, "Sold");

        self.tracker.set(TradeState::FetchBalances);
        Ok(self.execution.settle(balances, bought, &sold).await?)
    }

    async fn await_candidate(&self, balances: &Balances) -> Result<SharedTickerIndicator, TradingError> {
        self.tracker.set(TradeState::AwaitCandidate);
        let mut batches = self.monitor.subscribe();
        loop {
            let batch = batches.recv().await.ok_or(TradingError::SignalsClosed {
                source_name: TICKER_SOURCE,
            })?;
            if let Some(candidate) =
                select_candidate(&batch, balances, self.settings.base_currency.as_ref())
            {
                return Ok(candidate);
            }
        }
    }

    async fn await_sell_signal(
        &self,
        held: &SharedTickerIndicator,
        buy_price: f64,
        fee: f64,
    ) -> Result<(), TradingError> {
        self.tracker.set(TradeState::AwaitSellSignal);
        let mut batches = self.monitor.subscribe();
        loop {
            batches.recv().await.ok_or(TradingError::SignalsClosed {
                source_name: TICKER_SOURCE,
            })?;
            if held.should_sell(buy_price, fee) {
                debug!(pair = %held.pair(), buy_price, price = ?held.last_price(), "Sell signal");
                return Ok(());
            }
        }
    }
}

/// A state machine running on its own task.
#[derive(Debug)]
pub struct ExecutorHandle {
    task: JoinHandle<Result<(), TradingError>>,
    tracker: StateTracker,
}

impl ExecutorHandle {
    pub(crate) fn new(task: JoinHandle<Result<(), TradingError>>, tracker: StateTracker) -> Self {
        Self { task, tracker }
    }

    #[must_use]
    pub fn state(&self) -> TradeState {
        self.tracker.current()
    }

    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.tracker.cycles()
    }

    pub fn subscribe(&self) -> watch::Receiver<TradeState> {
        self.tracker.subscribe()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Abort at the current suspension point.
    pub fn interrupt(&self) {
        self.task.abort();
        self.tracker.set(TradeState::Stopped);
    }

    /// Wait for the task. An interrupted run counts as a clean stop.
    pub async fn join(self) -> Result<(), TradingError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}
