//! Per-exchange rate-limited dispatch loop.
//!
//! One [`ExchangeMonitor`] per exchange owns two FIFO lanes and a single
//! tokio task that pops one job at a time (high lane first), awaits the
//! broker call, hands the result to the light pool for callback delivery,
//! then sleeps until `1000 / rps` ms have passed since the dispatch started.
//! That spacing is the only backpressure in the system.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

use super::job::{Job, JobId, JobPriority, JobRequest, JobResponse, JobResult};
use super::Broker;
use crate::error::ExchangeError;
use crate::runtime::ResourcePool;

struct Shared {
    broker: Arc<dyn Broker>,
    pool: ResourcePool,
    high: Mutex<VecDeque<Job>>,
    normal: Mutex<VecDeque<Job>>,
    wake: Notify,
    stopped: AtomicBool,
    dispatched: AtomicU64,
    interval: Duration,
}

impl Shared {
    fn next_job(&self) -> Option<Job> {
        if let Some(job) = self.high.lock().pop_front() {
            return Some(job);
        }
        self.normal.lock().pop_front()
    }

    fn drain(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.high.lock().drain(..).collect();
        jobs.extend(self.normal.lock().drain(..));
        jobs
    }
}

/// Rate-limited priority scheduler for one exchange.
pub struct ExchangeMonitor {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ExchangeMonitor {
    /// Build a monitor without starting its dispatch loop.
    ///
    /// Jobs submitted before [`start`](Self::start) wait in their lanes.
    pub fn new(broker: Arc<dyn Broker>, pool: ResourcePool) -> Self {
        let rps = broker.requests_per_second_limit().max(1);
        let interval = Duration::from_secs(1) / rps;
        Self {
            shared: Arc::new(Shared {
                broker,
                pool,
                high: Mutex::new(VecDeque::new()),
                normal: Mutex::new(VecDeque::new()),
                wake: Notify::new(),
                stopped: AtomicBool::new(false),
                dispatched: AtomicU64::new(0),
                interval,
            }),
            task: Mutex::new(None),
        }
    }

    /// Build and immediately start a monitor.
    pub fn spawn(broker: Arc<dyn Broker>, pool: ResourcePool) -> Arc<Self> {
        let monitor = Arc::new(Self::new(broker, pool));
        monitor.start();
        monitor
    }

    /// Start the dispatch loop. Calling it again is a no-op.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.is_some() || self.shared.stopped.load(Ordering::SeqCst) {
            return;
        }
        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(dispatch_loop(shared)));
    }

    /// Enqueue a job and wake the dispatch loop. Never blocks.
    pub fn submit(&self, job: Job) -> JobId {
        let id = job.id();
        if self.shared.stopped.load(Ordering::SeqCst) {
            job.resolve(Err(ExchangeError::MonitorStopped));
            return id;
        }

        trace!(
            exchange = %self.shared.broker.name(),
            job_id = %id,
            operation = job.request().operation(),
            priority = ?job.priority(),
            "Job submitted"
        );
        match job.priority() {
            JobPriority::High => self.shared.high.lock().push_back(job),
            JobPriority::Normal => self.shared.normal.lock().push_back(job),
        }
        self.shared.wake.notify_one();

        // Lost a race with shutdown: the loop may already have drained.
        if self.shared.stopped.load(Ordering::SeqCst) {
            for job in self.shared.drain() {
                job.resolve(Err(ExchangeError::MonitorStopped));
            }
        }
        id
    }

    /// Stop after the in-flight dispatch, if any. Queued jobs resolve with
    /// [`ExchangeError::MonitorStopped`].
    pub fn shutdown(&self) {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.wake.notify_one();
        // Never started: nobody else will drain the lanes.
        if self.task.lock().is_none() {
            for job in self.shared.drain() {
                job.resolve(Err(ExchangeError::MonitorStopped));
            }
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.shared.broker.name()
    }

    /// Minimum spacing between dispatch starts.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// Jobs waiting in either lane.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.high.lock().len() + self.shared.normal.lock().len()
    }

    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.shared.dispatched.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ExchangeMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn dispatch_loop(shared: Arc<Shared>) {
    let exchange = shared.broker.name().to_string();
    info!(
        exchange = %exchange,
        interval_ms = shared.interval.as_millis() as u64,
        "Exchange monitor started"
    );

    loop {
        if shared.stopped.load(Ordering::SeqCst) {
            break;
        }
        let Some(job) = shared.next_job() else {
            shared.wake.notified().await;
            continue;
        };

        let started = Instant::now();
        let (id, request, callback) = job.into_parts();
        let operation = request.operation();
        debug!(exchange = %exchange, job_id = %id, operation, "Dispatching job");

        let result = AssertUnwindSafe(execute(shared.broker.as_ref(), request))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                warn!(exchange = %exchange, job_id = %id, operation, "Broker call panicked");
                Err(ExchangeError::UnexpectedResponse { operation })
            });
        if let Err(e) = &result {
            debug!(exchange = %exchange, job_id = %id, operation, error = %e, "Job failed");
        }
        shared.dispatched.fetch_add(1, Ordering::Relaxed);

        shared.pool.submit_light(move || callback(result));
        sleep_until(started + shared.interval).await;
    }

    let remaining = shared.drain();
    if !remaining.is_empty() {
        debug!(exchange = %exchange, count = remaining.len(), "Resolving queued jobs on shutdown");
    }
    for job in remaining {
        job.resolve(Err(ExchangeError::MonitorStopped));
    }
    info!(exchange = %exchange, "Exchange monitor stopped");
}

async fn execute(broker: &dyn Broker, request: JobRequest) -> JobResult {
    match request {
        JobRequest::GetTickers => broker.get_tickers().await.map(JobResponse::Tickers),
        JobRequest::Get24HourVolume => broker.get_24_hour_volume().await.map(JobResponse::Volumes),
        JobRequest::GetChartData {
            pair,
            start,
            end,
            period_secs,
        } => broker
            .get_chart_data(&pair, start, end, period_secs)
            .await
            .map(JobResponse::ChartData),
        JobRequest::GetOrderBook { pair, depth } => broker
            .get_order_book(&pair, depth)
            .await
            .map(JobResponse::OrderBook),
        JobRequest::GetOpenOrder { order_id } => broker
            .get_open_order(&order_id)
            .await
            .map(JobResponse::OpenOrder),
        JobRequest::GetOpenOrders { pair } => broker
            .get_open_orders(&pair)
            .await
            .map(JobResponse::OpenOrders),
        JobRequest::PlaceBuyOrder {
            pair,
            quantity,
            rate,
        } => broker
            .place_buy_order(&pair, quantity, rate)
            .await
            .map(JobResponse::Placement),
        JobRequest::PlaceSellOrder {
            pair,
            quantity,
            rate,
        } => broker
            .place_sell_order(&pair, quantity, rate)
            .await
            .map(JobResponse::Placement),
        JobRequest::CancelOpenOrder { order_id } => broker
            .cancel_open_order(&order_id)
            .await
            .map(JobResponse::Cancel),
        JobRequest::GetBalances => broker.get_balances().await.map(JobResponse::Balances),
    }
}
