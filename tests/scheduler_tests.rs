//! Exchange monitor ordering, pacing and shutdown.

use std::sync::Arc;
use std::time::Duration;

use coin_trader::domain::CurrencyPair;
use coin_trader::error::ExchangeError;
use coin_trader::exchange::{Exchange, ExchangeMonitor, Job, JobPriority, JobRequest, JobResponse};
use coin_trader::runtime::ResourcePool;
use coin_trader::testkit::broker::MockBroker;
use coin_trader::testkit::domain::tickers;
use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::oneshot;

fn pool() -> ResourcePool {
    ResourcePool::new(1, 4)
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[tokio::test]
async fn high_priority_job_dispatches_before_pending_normal_job() {
    let broker = Arc::new(MockBroker::new().with_rps(100));
    let monitor = Arc::new(ExchangeMonitor::new(broker.clone(), pool()));
    let order = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = oneshot::channel();
    let done_tx = Arc::new(Mutex::new(Some(done_tx)));

    let log = order.clone();
    monitor.submit(Job::new(JobPriority::Normal, JobRequest::GetBalances, move |_| {
        log.lock().push("normal");
        if let Some(tx) = done_tx.lock().take() {
            let _ = tx.send(());
        }
    }));
    let log = order.clone();
    monitor.submit(Job::new(JobPriority::High, JobRequest::GetTickers, move |_| {
        log.lock().push("high");
    }));
    assert_eq!(monitor.pending(), 2);

    monitor.start();
    done_rx.await.unwrap();
    // The high callback was handed to the pool first; give it a moment.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let calls = broker.calls();
    assert_eq!(calls[0].operation, "get_tickers");
    assert_eq!(calls[1].operation, "get_balances");
    assert_eq!(order.lock().first(), Some(&"high"));
}

#[tokio::test]
async fn placements_default_to_high_lane() {
    let pair = CurrencyPair::new("BTC", "ETH");
    let request = JobRequest::PlaceBuyOrder {
        pair,
        quantity: 1.0,
        rate: 1.0,
    };
    assert_eq!(request.default_priority(), JobPriority::High);
    assert_eq!(JobRequest::GetTickers.default_priority(), JobPriority::Normal);
}

// ---------------------------------------------------------------------------
// Pacing
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn dispatches_are_spaced_by_rate_limit() {
    let broker = Arc::new(
        MockBroker::new()
            .with_rps(10)
            .with_tickers(vec![tickers(&[("BTC_ETH", 1.0)])]),
    );
    let exchange = Exchange::new(broker.clone(), pool());

    let results = join_all((0..5).map(|_| exchange.get_tickers())).await;
    assert!(results.iter().all(Result::is_ok));

    let times = broker.call_times("get_tickers");
    assert_eq!(times.len(), 5);
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(100));
    }
}

#[tokio::test(start_paused = true)]
async fn slow_broker_calls_count_toward_the_interval() {
    let broker = Arc::new(
        MockBroker::new()
            .with_rps(10)
            .with_latency(Duration::from_millis(150)),
    );
    let exchange = Exchange::new(broker.clone(), pool());

    join_all((0..3).map(|_| exchange.get_balances())).await;

    let times = broker.call_times("get_balances");
    for pair in times.windows(2) {
        // A call longer than the interval is not followed by an extra wait.
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_millis(150));
        assert!(gap < Duration::from_millis(250));
    }
}

#[test]
fn interval_never_rounds_below_the_limit() {
    let monitor = ExchangeMonitor::new(Arc::new(MockBroker::new().with_rps(3)), pool());
    assert!(monitor.interval() > Duration::from_micros(333_333));
    assert_eq!(monitor.interval(), Duration::from_secs(1) / 3);
}

// ---------------------------------------------------------------------------
// Failures and shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unsupported_operation_fails_only_that_job() {
    let broker = Arc::new(MockBroker::new());
    let exchange = Exchange::new(broker.clone(), pool());
    let pair = CurrencyPair::new("BTC", "ETH");

    let book = exchange.get_order_book(&pair, 5).await;
    assert!(matches!(book, Err(ExchangeError::Unsupported { .. })));

    // The dispatch loop is still alive.
    assert!(exchange.get_balances().await.is_ok());
    assert!(exchange.monitor().is_running());
}

#[tokio::test]
async fn invalid_arguments_never_reach_the_broker() {
    let broker = Arc::new(MockBroker::new());
    let exchange = Exchange::new(broker.clone(), pool());
    let pair = CurrencyPair::new("BTC", "ETH");

    let result = exchange.place_buy_order(&pair, 0.0, 1.0).await;
    assert!(matches!(result, Err(ExchangeError::InvalidArgument { field: "quantity", .. })));
    let result = exchange.get_chart_data(&pair, 10, 5, 300).await;
    assert!(matches!(result, Err(ExchangeError::InvalidArgument { .. })));

    assert!(broker.calls().is_empty());
}

#[tokio::test]
async fn shutdown_resolves_queued_jobs() {
    let broker = Arc::new(MockBroker::new());
    let monitor = Arc::new(ExchangeMonitor::new(broker.clone(), pool()));
    let exchange = Exchange::with_monitor(broker.clone(), monitor.clone());

    let (tx, rx) = oneshot::channel();
    monitor.submit(Job::for_request(JobRequest::GetTickers, move |result| {
        let _ = tx.send(result);
    }));
    monitor.shutdown();

    assert!(matches!(rx.await.unwrap(), Err(ExchangeError::MonitorStopped)));
    assert!(matches!(
        exchange.get_balances().await,
        Err(ExchangeError::MonitorStopped)
    ));
    assert!(broker.calls().is_empty());
}

#[tokio::test]
async fn callback_receives_typed_response() {
    let broker = Arc::new(MockBroker::new().with_tickers(vec![tickers(&[("BTC_ETH", 2.0)])]));
    let exchange = Exchange::new(broker, pool());

    let (tx, rx) = oneshot::channel();
    exchange.submit(JobRequest::GetTickers, move |result| {
        let _ = tx.send(result);
    });

    match rx.await.unwrap() {
        Ok(JobResponse::Tickers(map)) => assert_eq!(map.len(), 1),
        other => panic!("unexpected {other:?}"),
    }
}
