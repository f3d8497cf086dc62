//! Units of work routed through the exchange scheduler.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::{
    Balances, CancelReceipt, Candle, CurrencyPair, OpenOrderStatus, OrderBook, OrderId,
    OrderPlacement, Tickers, Volumes,
};
use crate::error::ExchangeError;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide monotonic job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        Self(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dispatch lane. High drains completely before normal is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobPriority {
    Normal,
    High,
}

/// A broker operation and its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum JobRequest {
    GetTickers,
    Get24HourVolume,
    GetChartData {
        pair: CurrencyPair,
        start: i64,
        end: i64,
        period_secs: u32,
    },
    GetOrderBook {
        pair: CurrencyPair,
        depth: usize,
    },
    GetOpenOrder {
        order_id: OrderId,
    },
    GetOpenOrders {
        pair: CurrencyPair,
    },
    PlaceBuyOrder {
        pair: CurrencyPair,
        quantity: f64,
        rate: f64,
    },
    PlaceSellOrder {
        pair: CurrencyPair,
        quantity: f64,
        rate: f64,
    },
    CancelOpenOrder {
        order_id: OrderId,
    },
    GetBalances,
}

impl JobRequest {
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            JobRequest::GetTickers => "get_tickers",
            JobRequest::Get24HourVolume => "get_24_hour_volume",
            JobRequest::GetChartData { .. } => "get_chart_data",
            JobRequest::GetOrderBook { .. } => "get_order_book",
            JobRequest::GetOpenOrder { .. } => "get_open_order",
            JobRequest::GetOpenOrders { .. } => "get_open_orders",
            JobRequest::PlaceBuyOrder { .. } => "place_buy_order",
            JobRequest::PlaceSellOrder { .. } => "place_sell_order",
            JobRequest::CancelOpenOrder { .. } => "cancel_open_order",
            JobRequest::GetBalances => "get_balances",
        }
    }

    /// Order placement and cancellation jump the queue; reads wait their turn.
    #[must_use]
    pub const fn default_priority(&self) -> JobPriority {
        match self {
            JobRequest::PlaceBuyOrder { .. }
            | JobRequest::PlaceSellOrder { .. }
            | JobRequest::CancelOpenOrder { .. } => JobPriority::High,
            _ => JobPriority::Normal,
        }
    }
}

/// Successful broker reply, one variant per request kind.
#[derive(Debug, Clone, PartialEq)]
pub enum JobResponse {
    Tickers(Tickers),
    Volumes(Volumes),
    ChartData(Vec<Candle>),
    OrderBook(OrderBook),
    OpenOrder(OpenOrderStatus),
    OpenOrders(Vec<OpenOrderStatus>),
    Placement(OrderPlacement),
    Cancel(CancelReceipt),
    Balances(Balances),
}

pub type JobResult = Result<JobResponse, ExchangeError>;

/// Continuation invoked with the job's outcome.
pub type JobCallback = Box<dyn FnOnce(JobResult) + Send + 'static>;

/// Immutable unit of work. Resolved exactly once, then discarded.
pub struct Job {
    id: JobId,
    priority: JobPriority,
    request: JobRequest,
    callback: JobCallback,
}

impl Job {
    pub fn new<F>(priority: JobPriority, request: JobRequest, callback: F) -> Self
    where
        F: FnOnce(JobResult) + Send + 'static,
    {
        Self {
            id: JobId::next(),
            priority,
            request,
            callback: Box::new(callback),
        }
    }

    /// A job at the request's default priority.
    pub fn for_request<F>(request: JobRequest, callback: F) -> Self
    where
        F: FnOnce(JobResult) + Send + 'static,
    {
        let priority = request.default_priority();
        Self::new(priority, request, callback)
    }

    #[must_use]
    pub const fn id(&self) -> JobId {
        self.id
    }

    #[must_use]
    pub const fn priority(&self) -> JobPriority {
        self.priority
    }

    #[must_use]
    pub const fn request(&self) -> &JobRequest {
        &self.request
    }

    /// Consume the job by invoking its callback.
    pub fn resolve(self, result: JobResult) {
        (self.callback)(result);
    }

    pub(crate) fn into_parts(self) -> (JobId, JobRequest, JobCallback) {
        (self.id, self.request, self.callback)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_ids_are_monotonic() {
        let a = Job::for_request(JobRequest::GetTickers, |_| {});
        let b = Job::for_request(JobRequest::GetTickers, |_| {});
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_order_operations_are_high_priority() {
        let pair = CurrencyPair::new("BTC", "ETH");
        let buy = JobRequest::PlaceBuyOrder {
            pair: pair.clone(),
            quantity: 1.0,
            rate: 1.0,
        };
        let cancel = JobRequest::CancelOpenOrder {
            order_id: OrderId::new("1"),
        };
        assert_eq!(buy.default_priority(), JobPriority::High);
        assert_eq!(cancel.default_priority(), JobPriority::High);
        assert_eq!(JobRequest::GetBalances.default_priority(), JobPriority::Normal);
        assert_eq!(
            JobRequest::GetOpenOrder {
                order_id: OrderId::new("1")
            }
            .default_priority(),
            JobPriority::Normal
        );
    }

    #[test]
    fn test_resolve_invokes_callback_once() {
        let (tx, rx) = std::sync::mpsc::channel();
        let job = Job::for_request(JobRequest::GetBalances, move |result| {
            tx.send(result.is_err()).unwrap();
        });
        job.resolve(Err(ExchangeError::MonitorStopped));
        assert_eq!(rx.recv().unwrap(), true);
        assert!(rx.recv().is_err());
    }
}
