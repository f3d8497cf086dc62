//! The rate-limited capability facade over a [`Broker`].

use std::sync::Arc;

use tokio::sync::oneshot;

use super::job::{Job, JobId, JobPriority, JobRequest, JobResponse, JobResult};
use super::{Broker, ExchangeMonitor};
use crate::domain::{
    Balances, CancelReceipt, Candle, CurrencyPair, OpenOrderStatus, OrderBook, OrderId,
    OrderPlacement, Tickers, Volumes,
};
use crate::error::ExchangeError;
use crate::runtime::ResourcePool;

/// The only way components reach a broker.
///
/// Every operation validates its arguments, becomes a [`Job`] and is
/// submitted to the exchange's [`ExchangeMonitor`]. Placement and
/// cancellation go in the high lane, everything else in the normal lane.
/// Cheap to clone; clones share one monitor.
#[derive(Clone)]
pub struct Exchange {
    broker: Arc<dyn Broker>,
    monitor: Arc<ExchangeMonitor>,
}

impl Exchange {
    /// Wrap `broker` with a freshly started monitor.
    pub fn new(broker: Arc<dyn Broker>, pool: ResourcePool) -> Self {
        let monitor = ExchangeMonitor::spawn(Arc::clone(&broker), pool);
        Self { broker, monitor }
    }

    /// Wrap `broker` with an existing monitor built over the same broker.
    pub fn with_monitor(broker: Arc<dyn Broker>, monitor: Arc<ExchangeMonitor>) -> Self {
        Self { broker, monitor }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.broker.name()
    }

    #[must_use]
    pub fn requests_per_second_limit(&self) -> u32 {
        self.broker.requests_per_second_limit()
    }

    #[must_use]
    pub fn fee(&self) -> f64 {
        self.broker.fee()
    }

    #[must_use]
    pub fn check_config(&self) -> bool {
        self.broker.check_config()
    }

    #[must_use]
    pub fn monitor(&self) -> &Arc<ExchangeMonitor> {
        &self.monitor
    }

    /// Continuation-style submission at the request's default priority.
    pub fn submit<F>(&self, request: JobRequest, callback: F) -> JobId
    where
        F: FnOnce(JobResult) + Send + 'static,
    {
        self.monitor.submit(Job::for_request(request, callback))
    }

    async fn call(&self, request: JobRequest) -> JobResult {
        let (tx, rx) = oneshot::channel();
        self.submit(request, move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(ExchangeError::MonitorStopped))
    }

    pub async fn get_tickers(&self) -> Result<Tickers, ExchangeError> {
        match self.call(JobRequest::GetTickers).await? {
            JobResponse::Tickers(tickers) => Ok(tickers),
            _ => Err(unexpected("get_tickers")),
        }
    }

    pub async fn get_24_hour_volume(&self) -> Result<Volumes, ExchangeError> {
        match self.call(JobRequest::Get24HourVolume).await? {
            JobResponse::Volumes(volumes) => Ok(volumes),
            _ => Err(unexpected("get_24_hour_volume")),
        }
    }

    /// Candles for `pair` between `start` and `end` unix seconds.
    pub async fn get_chart_data(
        &self,
        pair: &CurrencyPair,
        start: i64,
        end: i64,
        period_secs: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        if period_secs == 0 {
            return Err(invalid("period_secs", "must be positive"));
        }
        if start > end {
            return Err(invalid("start", format!("{start} is after end {end}")));
        }
        let request = JobRequest::GetChartData {
            pair: pair.clone(),
            start,
            end,
            period_secs,
        };
        match self.call(request).await? {
            JobResponse::ChartData(candles) => Ok(candles),
            _ => Err(unexpected("get_chart_data")),
        }
    }

    pub async fn get_order_book(
        &self,
        pair: &CurrencyPair,
        depth: usize,
    ) -> Result<OrderBook, ExchangeError> {
        if depth == 0 {
            return Err(invalid("depth", "must be positive"));
        }
        let request = JobRequest::GetOrderBook {
            pair: pair.clone(),
            depth,
        };
        match self.call(request).await? {
            JobResponse::OrderBook(book) => Ok(book),
            _ => Err(unexpected("get_order_book")),
        }
    }

    pub async fn get_open_order(
        &self,
        order_id: &OrderId,
    ) -> Result<OpenOrderStatus, ExchangeError> {
        check_order_id(order_id)?;
        let request = JobRequest::GetOpenOrder {
            order_id: order_id.clone(),
        };
        match self.call(request).await? {
            JobResponse::OpenOrder(status) => Ok(status),
            _ => Err(unexpected("get_open_order")),
        }
    }

    pub async fn get_open_orders(
        &self,
        pair: &CurrencyPair,
    ) -> Result<Vec<OpenOrderStatus>, ExchangeError> {
        let request = JobRequest::GetOpenOrders { pair: pair.clone() };
        match self.call(request).await? {
            JobResponse::OpenOrders(orders) => Ok(orders),
            _ => Err(unexpected("get_open_orders")),
        }
    }

    pub async fn place_buy_order(
        &self,
        pair: &CurrencyPair,
        quantity: f64,
        rate: f64,
    ) -> Result<OrderPlacement, ExchangeError> {
        check_order_size(quantity, rate)?;
        let request = JobRequest::PlaceBuyOrder {
            pair: pair.clone(),
            quantity,
            rate,
        };
        match self.call(request).await? {
            JobResponse::Placement(placement) => Ok(placement),
            _ => Err(unexpected("place_buy_order")),
        }
    }

    pub async fn place_sell_order(
        &self,
        pair: &CurrencyPair,
        quantity: f64,
        rate: f64,
    ) -> Result<OrderPlacement, ExchangeError> {
        check_order_size(quantity, rate)?;
        let request = JobRequest::PlaceSellOrder {
            pair: pair.clone(),
            quantity,
            rate,
        };
        match self.call(request).await? {
            JobResponse::Placement(placement) => Ok(placement),
            _ => Err(unexpected("place_sell_order")),
        }
    }

    pub async fn cancel_open_order(&self, order_id: &OrderId) -> Result<CancelReceipt, ExchangeError> {
        check_order_id(order_id)?;
        let request = JobRequest::CancelOpenOrder {
            order_id: order_id.clone(),
        };
        match self.call(request).await? {
            JobResponse::Cancel(receipt) => Ok(receipt),
            _ => Err(unexpected("cancel_open_order")),
        }
    }

    pub async fn get_balances(&self) -> Result<Balances, ExchangeError> {
        match self.call(JobRequest::GetBalances).await? {
            JobResponse::Balances(balances) => Ok(balances),
            _ => Err(unexpected("get_balances")),
        }
    }

    /// Submit a job at an explicit priority, bypassing the default lane.
    pub fn submit_with_priority<F>(&self, priority: JobPriority, request: JobRequest, callback: F) -> JobId
    where
        F: FnOnce(JobResult) + Send + 'static,
    {
        self.monitor.submit(Job::new(priority, request, callback))
    }
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("name", &self.name())
            .field("requests_per_second", &self.requests_per_second_limit())
            .finish_non_exhaustive()
    }
}

const fn unexpected(operation: &'static str) -> ExchangeError {
    ExchangeError::UnexpectedResponse { operation }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ExchangeError {
    ExchangeError::InvalidArgument {
        field,
        reason: reason.into(),
    }
}

fn check_order_size(quantity: f64, rate: f64) -> Result<(), ExchangeError> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(invalid("quantity", format!("{quantity} is not a positive amount")));
    }
    if !rate.is_finite() || rate <= 0.0 {
        return Err(invalid("rate", format!("{rate} is not a positive price")));
    }
    Ok(())
}

fn check_order_id(order_id: &OrderId) -> Result<(), ExchangeError> {
    if order_id.is_empty() {
        return Err(invalid("order_id", "must not be empty"));
    }
    Ok(())
}
