//! The candle-history trading state machine.

use std::convert::Infallible;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use super::execution::{ExecutionMode, OrderExecution};
use super::executor::{ExecutorHandle, ExecutorSettings};
use super::paper::PaperExecution;
use super::signal::HistorySignal;
use super::state::{StateTracker, TradeState};
use super::supervisor::supervise;
use crate::domain::{Balances, Trade};
use crate::error::TradingError;
use crate::market::{HistoryEvent, HistoryMonitor};
use crate::strategy::SharedHistoryIndicator;

const HISTORY_SOURCE: &str = "history monitor";

/// First pair of a buy trigger whose base currency is held.
#[must_use]
pub fn first_funded(
    candidates: &[SharedHistoryIndicator],
    balances: &Balances,
) -> Option<SharedHistoryIndicator> {
    candidates
        .iter()
        .find(|indicator| balances.amount(indicator.pair().base()) > 0.0)
        .map(Arc::clone)
}

#[derive(Clone)]
struct Position {
    indicator: SharedHistoryIndicator,
    bought: Trade,
    balances: Balances,
}

/// Buys on a history buy trigger and sells on the held pair's sell trigger.
///
/// There is no priming: every analysis cycle already sees a full window of
/// candles. A restarted session resumes an unsold position.
pub struct HistoryAlgExecutor<X> {
    monitor: Arc<HistoryMonitor>,
    execution: X,
    settings: ExecutorSettings,
    tracker: StateTracker,
    held: Mutex<Option<Position>>,
}

/// The candle-history state machine trading on paper.
pub type HistoryAlgTester = HistoryAlgExecutor<PaperExecution>;

impl<X: OrderExecution> HistoryAlgExecutor<X> {
    pub fn new(monitor: Arc<HistoryMonitor>, execution: X, settings: ExecutorSettings) -> Self {
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

    pub async fn run(&self) -> Result<(), TradingError> {
        self.tracker.set(TradeState::Init);
        let exchange = self.monitor.exchange();
        info!(
            config = true,
            exchange = %exchange.name(),
            strategy = self.monitor.strategy().name(),
            mode = self.execution.mode().as_str(),
            "Starting history trading"
        );

        if self.execution.mode() == ExecutionMode::Live && !exchange.check_config() {
            self.tracker.set(TradeState::Stopped);
            error!(exchange = %exchange.name(), "Exchange configuration is empty or invalid");
            return Err(TradingError::Misconfigured {
                exchange: exchange.name().to_string(),
            });
        }
        self.monitor.start();

        Err(supervise(
            "history_alg_executor",
            &self.tracker,
            self.settings.restart_base,
            self.settings.restart_max,
            || self.session(),
        )
        .await)
    }

    pub fn spawn(self) -> ExecutorHandle
    where
        X: 'static,
    {
        let tracker = self.tracker.clone();
        let task = tokio::spawn(async move { self.run().await });
        ExecutorHandle::new(task, tracker)
    }

    async fn session(&self) -> Result<Infallible, TradingError> {
        let held = self.held.lock().clone();
        let mut balances = match held {
            Some(position) => {
                warn!(pair = %position.indicator.pair(), rate = position.bought.rate, "Resuming held position");
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

    async fn run_round(&self, balances: Balances) -> Result<Balances, TradingError> {
        let candidate = self.await_candidate(&balances).await?;
        let pair = candidate.pair().clone();
        info!(pair = %pair, weight = candidate.buy_weight(), "Buy candidate selected");

        let signal = HistorySignal::new(Arc::clone(&candidate), self.monitor.exchange().clone());
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

    async fn close_position(&self, position: &Position) -> Result<Balances, TradingError> {
        let pair = position.indicator.pair();
        let signal = HistorySignal::new(Arc::clone(&position.indicator), self.monitor.exchange().clone());

        let sold = loop {
            self.await_sell_trigger(&position.indicator).await?;
            if let Some(sold) = self.execution.sell(&signal, &position.bought, &self.tracker).await? {
                break sold;
            }
        };
        *self.held.lock() = None;
        self.tracker.set(TradeState::SellFilled);
        info!(pair = %pair, rate = sold.rate, quantity = sold.quantity, "Sold");

        self.tracker.set(TradeState::FetchBalances);
        Ok(self.execution.settle(&position.balances, &position.bought, &sold).await?)
    }

    async fn await_candidate(&self, balances: &Balances) -> Result<SharedHistoryIndicator, TradingError> {
        self.tracker.set(TradeState::AwaitCandidate);
        let mut events = self.monitor.subscribe();
        loop {
            let event = events.recv().await.ok_or(TradingError::SignalsClosed {
                source_name: HISTORY_SOURCE,
            })?;
            if let HistoryEvent::BuyTrigger(candidates) = event {
                if let Some(candidate) = first_funded(&candidates, balances) {
                    return Ok(candidate);
                }
            }
        }
    }

    async fn await_sell_trigger(&self, held: &SharedHistoryIndicator) -> Result<(), TradingError> {
        self.tracker.set(TradeState::AwaitSellSignal);
        let mut events = self.monitor.subscribe();
        loop {
            let event = events.recv().await.ok_or(TradingError::SignalsClosed {
                source_name: HISTORY_SOURCE,
            })?;
            if let HistoryEvent::SellTrigger(indicator) = event {
                if Arc::ptr_eq(&indicator, held) {
                    return Ok(());
                }
            }
        }
    }
}
