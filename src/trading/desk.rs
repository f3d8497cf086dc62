//! Order placement, watching and cancellation against the scheduler.

use tracing::{debug, info, warn};

use crate::domain::{CurrencyPair, OrderId, OrderPlacement, OrderSide};
use crate::error::ExchangeError;
use crate::exchange::Exchange;

/// How watching an open order ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The order closed on the book.
    Filled,
    /// The watch budget ran out and the order was canceled.
    Canceled,
    /// The watch budget ran out but the cancel failed or was refused.
    CancelFailed,
}

/// Drives one order at a time through place, watch and cancel.
///
/// The watch budget is `requests_per_second × retry_period_secs` polls, so
/// an order gets roughly `retry_period_secs` of wall time at the
/// scheduler's cadence before it is canceled.
#[derive(Debug, Clone)]
pub struct OrderDesk {
    exchange: Exchange,
    watch_budget: u32,
}

impl OrderDesk {
    pub fn new(exchange: Exchange, retry_period_secs: u32) -> Self {
        let watch_budget = exchange
            .requests_per_second_limit()
            .max(1)
            .saturating_mul(retry_period_secs.max(1));
        Self {
            exchange,
            watch_budget,
        }
    }

    #[must_use]
    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    #[must_use]
    pub const fn watch_budget(&self) -> u32 {
        self.watch_budget
    }

    /// Place a buy, resubmitting on refusal or transient failure for as long
    /// as `still_wanted` holds. `None` means the buy was given up.
    pub async fn place_buy<F>(
        &self,
        pair: &CurrencyPair,
        quantity: f64,
        rate: f64,
        still_wanted: F,
    ) -> Result<Option<OrderId>, ExchangeError>
    where
        F: Fn() -> bool + Send + Sync,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.exchange.place_buy_order(pair, quantity, rate).await {
                Ok(OrderPlacement::Placed(order_id)) => {
                    info!(pair = %pair, order_id = %order_id, quantity, rate, attempt, "Buy order placed");
                    return Ok(Some(order_id));
                }
                Ok(OrderPlacement::NotPlaced { reason }) => {
                    debug!(pair = %pair, attempt, reason = %reason, "Buy order not placed");
                }
                Err(e) if e.is_retryable() => {
                    warn!(pair = %pair, attempt, error = %e, "Buy order failed");
                }
                Err(e) => return Err(e),
            }

            if !still_wanted() {
                info!(pair = %pair, attempt, "Buy no longer favoured, giving up");
                return Ok(None);
            }
        }
    }

    /// Place a sell, resubmitting on refusal or transient failure until it
    /// is accepted. A position must eventually be closed.
    pub async fn place_sell(
        &self,
        pair: &CurrencyPair,
        quantity: f64,
        rate: f64,
    ) -> Result<OrderId, ExchangeError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.exchange.place_sell_order(pair, quantity, rate).await {
                Ok(OrderPlacement::Placed(order_id)) => {
                    info!(pair = %pair, order_id = %order_id, quantity, rate, attempt, "Sell order placed");
                    return Ok(order_id);
                }
                Ok(OrderPlacement::NotPlaced { reason }) => {
                    debug!(pair = %pair, attempt, reason = %reason, "Sell order not placed");
                }
                Err(e) if e.is_retryable() => {
                    warn!(pair = %pair, attempt, error = %e, "Sell order failed");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Poll an open order until it closes or the watch budget runs out.
    ///
    /// Only polls that report an open order spend budget. Once the budget is
    /// spent the order is canceled, unless it is partially filled, in which
    /// case watching continues until it closes.
    pub async fn watch(
        &self,
        order_id: &OrderId,
        side: OrderSide,
    ) -> Result<WatchOutcome, ExchangeError> {
        let mut remaining = i64::from(self.watch_budget);
        loop {
            match self.exchange.get_open_order(order_id).await {
                Ok(status) if status.closed => {
                    debug!(order_id = %order_id, side = %side, "Order closed");
                    return Ok(WatchOutcome::Filled);
                }
                Ok(status) => {
                    remaining -= 1;
                    if remaining <= 0 && !status.partially_filled {
                        return self.cancel(order_id, side).await;
                    }
                }
                Err(e) if e.is_retryable() => {
                    debug!(order_id = %order_id, side = %side, error = %e, "Order status unavailable");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn cancel(&self, order_id: &OrderId, side: OrderSide) -> Result<WatchOutcome, ExchangeError> {
        info!(order_id = %order_id, side = %side, "Watch budget spent, canceling order");
        match self.exchange.cancel_open_order(order_id).await {
            Ok(receipt) if receipt.canceled => Ok(WatchOutcome::Canceled),
            Ok(_) => {
                warn!(order_id = %order_id, side = %side, "Cancel refused by exchange");
                Ok(WatchOutcome::CancelFailed)
            }
            Err(ExchangeError::MonitorStopped) => Err(ExchangeError::MonitorStopped),
            Err(e) => {
                warn!(order_id = %order_id, side = %side, error = %e, "Cancel failed");
                Ok(WatchOutcome::CancelFailed)
            }
        }
    }
}
