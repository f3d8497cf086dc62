//! How buys and sells are filled: against the exchange, or on paper.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::desk::{OrderDesk, WatchOutcome};
use super::signal::PositionSignal;
use super::state::{StateTracker, TradeState};
use crate::domain::{Balances, OrderSide, Trade};
use crate::error::ExchangeError;
use crate::exchange::{retry_read, Exchange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Real orders through the exchange.
    Live,
    /// Synthetic fills at the observed price.
    Paper,
}

impl ExecutionMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Live => "live",
            ExecutionMode::Paper => "paper",
        }
    }
}

/// Fills the state machine's buys and sells.
#[async_trait]
pub trait OrderExecution: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    /// Holdings used to size the next buy.
    async fn balances(&self) -> Result<Balances, ExchangeError>;

    /// Buy `signal.pair()` with the whole base balance.
    ///
    /// `None` means the buy was missed or abandoned.
    async fn buy(
        &self,
        signal: &dyn PositionSignal,
        balances: &Balances,
        tracker: &StateTracker,
    ) -> Result<Option<Trade>, ExchangeError>;

    /// Close the position opened by `bought`.
    ///
    /// `None` means the sell timed out and was canceled; the caller waits
    /// for the next sell signal and tries again.
    async fn sell(
        &self,
        signal: &dyn PositionSignal,
        bought: &Trade,
        tracker: &StateTracker,
    ) -> Result<Option<Trade>, ExchangeError>;

    /// Reconcile after a completed round-trip and return fresh balances.
    async fn settle(
        &self,
        before: &Balances,
        bought: &Trade,
        sold: &Trade,
    ) -> Result<Balances, ExchangeError>;
}

#[async_trait]
impl<T: OrderExecution + ?Sized> OrderExecution for Arc<T> {
    fn mode(&self) -> ExecutionMode {
        (**self).mode()
    }

    async fn balances(&self) -> Result<Balances, ExchangeError> {
        (**self).balances().await
    }

    async fn buy(
        &self,
        signal: &dyn PositionSignal,
        balances: &Balances,
        tracker: &StateTracker,
    ) -> Result<Option<Trade>, ExchangeError> {
        (**self).buy(signal, balances, tracker).await
    }

    async fn sell(
        &self,
        signal: &dyn PositionSignal,
        bought: &Trade,
        tracker: &StateTracker,
    ) -> Result<Option<Trade>, ExchangeError> {
        (**self).sell(signal, bought, tracker).await
    }

    async fn settle(
        &self,
        before: &Balances,
        bought: &Trade,
        sold: &Trade,
    ) -> Result<Balances, ExchangeError> {
        (**self).settle(before, bought, sold).await
    }
}

/// Real orders through the rate-limited exchange facade.
#[derive(Debug, Clone)]
pub struct LiveExecution {
    desk: OrderDesk,
    settle_delay: Duration,
}

impl LiveExecution {
    pub fn new(exchange: Exchange, retry_period_secs: u32, settle_delay: Duration) -> Self {
        Self {
            desk: OrderDesk::new(exchange, retry_period_secs),
            settle_delay,
        }
    }

    #[must_use]
    pub fn desk(&self) -> &OrderDesk {
        &self.desk
    }

    fn exchange(&self) -> &Exchange {
        self.desk.exchange()
    }
}

#[async_trait]
impl OrderExecution for LiveExecution {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Live
    }

    async fn balances(&self) -> Result<Balances, ExchangeError> {
        let exchange = self.exchange();
        retry_read(exchange.name(), "get_balances", || exchange.get_balances()).await
    }

    async fn buy(
        &self,
        signal: &dyn PositionSignal,
        balances: &Balances,
        tracker: &StateTracker,
    ) -> Result<Option<Trade>, ExchangeError> {
        let pair = signal.pair();
        let fee = self.exchange().fee();

        loop {
            tracker.set(TradeState::BuyPlacing);
            let Some(rate) = signal.latest_rate().await? else {
                info!(pair = %pair, "No current price, buy missed");
                return Ok(None);
            };
            let quantity = (balances.amount(pair.base()) / rate) / (1.0 + fee);

            let placed = self
                .desk
                .place_buy(pair, quantity, rate, || signal.favours_buy())
                .await?;
            let Some(order_id) = placed else {
                return Ok(None);
            };

            tracker.set(TradeState::BuyWatching);
            let trade = Trade::new(pair.clone(), rate, quantity, fee);
            match self.desk.watch(&order_id, OrderSide::Buy).await? {
                WatchOutcome::Filled => return Ok(Some(trade)),
                WatchOutcome::CancelFailed => {
                    warn!(pair = %pair, order_id = %order_id, "Buy cancel failed, treating order as filled");
                    return Ok(Some(trade));
                }
                WatchOutcome::Canceled if signal.favours_buy() => {
                    info!(pair = %pair, "Buy canceled, still favoured, placing again");
                }
                WatchOutcome::Canceled => {
                    info!(pair = %pair, "Buy canceled and no longer favoured");
                    return Ok(None);
                }
            }
        }
    }

    async fn sell(
        &self,
        signal: &dyn PositionSignal,
        bought: &Trade,
        tracker: &StateTracker,
    ) -> Result<Option<Trade>, ExchangeError> {
        let pair = signal.pair();
        let fee = self.exchange().fee();

        tracker.set(TradeState::SellPlacing);
        let Some(rate) = signal.latest_rate().await? else {
            info!(pair = %pair, "No current price, waiting for next sell signal");
            return Ok(None);
        };
        let quantity = bought.quantity / (1.0 + fee);
        let order_id = self.desk.place_sell(pair, quantity, rate).await?;

        tracker.set(TradeState::SellWatching);
        loop {
            match self.desk.watch(&order_id, OrderSide::Sell).await? {
                WatchOutcome::Filled => return Ok(Some(Trade::new(pair.clone(), rate, quantity, fee))),
                WatchOutcome::Canceled => {
                    info!(pair = %pair, order_id = %order_id, "Sell canceled, waiting for next sell signal");
                    return Ok(None);
                }
                WatchOutcome::CancelFailed => {
                    // A failed cancel says nothing about the fill; ask again.
                    let exchange = self.exchange();
                    let status = retry_read(exchange.name(), "get_open_order", || {
                        exchange.get_open_order(&order_id)
                    })
                    .await?;
                    if status.closed {
                        return Ok(Some(Trade::new(pair.clone(), rate, quantity, fee)));
                    }
                    warn!(pair = %pair, order_id = %order_id, "Sell still open after failed cancel, watching again");
                }
            }
        }
    }

    async fn settle(
        &self,
        before: &Balances,
        _bought: &Trade,
        _sold: &Trade,
    ) -> Result<Balances, ExchangeError> {
        // Exchange balances lag behind fills.
        tokio::time::sleep(self.settle_delay).await;
        let after = self.balances().await?;

        for stat in before.diff(&after) {
            info!(
                exchange = %self.exchange().name(),
                currency = %stat.currency,
                old_amount = stat.old_amount,
                new_amount = stat.new_amount,
                amount_gain = stat.amount_gain(),
                ratio_gain = stat.ratio_gain(),
                "Balance changed"
            );
        }
        Ok(after)
    }
}
