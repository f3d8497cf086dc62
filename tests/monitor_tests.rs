//! Ticker and history producers fed by a scripted broker.

use std::sync::Arc;
use std::time::Duration;

use coin_trader::error::ExchangeError;
use coin_trader::market::{HistoryEvent, HistoryMonitor, TickerMonitor};
use coin_trader::runtime::ResourcePool;
use coin_trader::strategy::{HistoryStrategy, TickerStrategy};
use coin_trader::testkit::broker::MockBroker;
use coin_trader::testkit::domain::{candles_closing_at, flat_candles, pair, tickers};

fn five_pairs(price: f64) -> coin_trader::domain::Tickers {
    tickers(&[
        ("BTC_ETH", price),
        ("BTC_LTC", price),
        ("BTC_XMR", price),
        ("USDT_BTC", price),
        ("ETH_ETC", price),
    ])
}

// ---------------------------------------------------------------------------
// Ticker monitor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_indicator_per_pair_across_polls() {
    let (_broker, exchange) = MockBroker::new()
        .with_tickers(vec![five_pairs(1.0), five_pairs(1.1), five_pairs(1.2)])
        .into_exchange();
    let monitor = TickerMonitor::new(exchange, TickerStrategy::Bollinger);

    for _ in 0..7 {
        monitor.poll_once().await.unwrap();
    }

    assert_eq!(monitor.indicator_count(), 5);
    assert_eq!(monitor.polls(), 7);
    let indicator = monitor.indicator(&pair("BTC_ETH")).unwrap();
    assert_eq!(indicator.sample_count(), 7);
    assert_eq!(indicator.last_price(), Some(1.2));
}

#[tokio::test]
async fn subscribers_receive_every_batch() {
    let (_broker, exchange) = MockBroker::new()
        .with_tickers(vec![five_pairs(1.0)])
        .into_exchange();
    let monitor = TickerMonitor::new(exchange, TickerStrategy::Reaction);
    let mut batches = monitor.subscribe();

    monitor.start();
    let first = batches.recv().await.unwrap();
    let second = batches.recv().await.unwrap();
    monitor.stop();

    assert_eq!(first.len(), 5);
    assert_eq!(second.len(), 5);
    // Same pair, same shared indicator.
    assert!(Arc::ptr_eq(&first[0], &second[0]));
    assert!(monitor.hub().is_closed());
}

#[tokio::test(start_paused = true)]
async fn failed_ticker_polls_are_retried() {
    let (broker, exchange) = MockBroker::new()
        .with_rps(10)
        .with_ticker_failures(3)
        .with_tickers(vec![five_pairs(1.0)])
        .into_exchange();
    let monitor = TickerMonitor::new(exchange, TickerStrategy::Bollinger);

    let batch = monitor.poll_once().await.unwrap();

    assert_eq!(batch.len(), 5);
    assert_eq!(broker.call_count("get_tickers"), 4);
    assert_eq!(monitor.polls(), 1);
}

#[tokio::test(start_paused = true)]
async fn ticker_loop_outlives_a_rejected_poll() {
    let (broker, exchange) = MockBroker::new()
        .with_ticker_errors(vec![ExchangeError::InvalidArgument {
            field: "command",
            reason: "scripted".into(),
        }])
        .with_tickers(vec![five_pairs(1.0)])
        .into_exchange();
    let monitor = TickerMonitor::new(exchange, TickerStrategy::Reaction);
    let mut batches = monitor.subscribe();

    monitor.start();
    let batch = batches.recv().await.expect("feed stays open after a failed poll");

    assert_eq!(batch.len(), 5);
    assert!(!monitor.hub().is_closed());
    assert!(broker.call_count("get_tickers") >= 2);
    monitor.stop();
}

#[tokio::test]
async fn stop_closes_the_feed() {
    let (_broker, exchange) = MockBroker::new()
        .with_tickers(vec![five_pairs(1.0)])
        .into_exchange();
    let monitor = TickerMonitor::new(exchange, TickerStrategy::Bollinger);
    monitor.start();
    monitor.stop();

    let mut late = monitor.subscribe();
    assert!(late.recv().await.is_none());
}

// ---------------------------------------------------------------------------
// History monitor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_cycle_reports_buy_and_sell_pairs() {
    let closes: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 0.9 } else { 1.1 }).collect();
    let (broker, exchange) = MockBroker::new()
        .with_tickers(vec![tickers(&[("BTC_ETH", 0.7), ("BTC_LTC", 1.05), ("BTC_XMR", 0.95)])])
        .with_candles(pair("BTC_ETH"), candles_closing_at(&closes, 1_600_000_000, 300))
        .with_candles(pair("BTC_LTC"), candles_closing_at(&closes, 1_600_000_000, 300))
        .with_candles(pair("BTC_XMR"), candles_closing_at(&closes, 1_600_000_000, 300))
        .into_exchange();
    let monitor = HistoryMonitor::new(exchange, HistoryStrategy::Bollinger, ResourcePool::new(1, 4));
    let mut events = monitor.subscribe();

    assert_eq!(monitor.enumerate_pairs().await.unwrap(), 3);
    let report = monitor.run_cycle().await.unwrap();

    assert_eq!(report.analyzed, 3);
    assert_eq!(report.buy_candidates, 1);
    assert_eq!(report.sell_triggers, 1);
    assert_eq!(broker.call_count("get_chart_data"), 3);

    let mut sells = Vec::new();
    let mut buys = Vec::new();
    while let Some(event) = events.try_recv() {
        match event {
            HistoryEvent::SellTrigger(indicator) => sells.push(indicator.pair().to_string()),
            HistoryEvent::BuyTrigger(batch) => {
                buys.extend(batch.iter().map(|i| i.pair().to_string()));
            }
        }
    }
    assert_eq!(sells, vec!["BTC_LTC"]);
    assert_eq!(buys, vec!["BTC_ETH"]);
}

#[tokio::test]
async fn history_cycle_between_bands_broadcasts_nothing() {
    let closes: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 0.9 } else { 1.1 }).collect();
    let (_broker, exchange) = MockBroker::new()
        .with_tickers(vec![tickers(&[("BTC_ETH", 0.95)])])
        .with_candles(pair("BTC_ETH"), candles_closing_at(&closes, 1_600_000_000, 300))
        .into_exchange();
    let monitor = HistoryMonitor::new(exchange, HistoryStrategy::Bollinger, ResourcePool::new(1, 4));
    let mut events = monitor.subscribe();

    monitor.enumerate_pairs().await.unwrap();
    let report = monitor.run_cycle().await.unwrap();

    assert_eq!(report.analyzed, 1);
    assert_eq!(report.buy_candidates, 0);
    assert_eq!(report.sell_triggers, 0);
    assert!(events.try_recv().is_none());
}

#[tokio::test]
async fn history_cycle_skips_pair_whose_chart_fails() {
    let closes: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 0.9 } else { 1.1 }).collect();
    let (_broker, exchange) = MockBroker::new()
        .with_tickers(vec![tickers(&[("BTC_ETH", 0.7), ("BTC_LTC", 0.7)])])
        .with_candles(pair("BTC_ETH"), candles_closing_at(&closes, 1_600_000_000, 300))
        .with_chart_error(
            pair("BTC_LTC"),
            ExchangeError::UnexpectedResponse { operation: "get_chart_data" },
        )
        .into_exchange();
    let monitor = HistoryMonitor::new(exchange, HistoryStrategy::Bollinger, ResourcePool::new(1, 4));
    let mut events = monitor.subscribe();

    monitor.enumerate_pairs().await.unwrap();
    let report = monitor.run_cycle().await.expect("one bad pair does not fail the cycle");

    assert_eq!(report.analyzed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.buy_candidates, 1);
    match events.try_recv() {
        Some(HistoryEvent::BuyTrigger(batch)) => {
            assert_eq!(batch.len(), 1);
            assert_eq!(batch[0].pair(), &pair("BTC_ETH"));
        }
        other => panic!("Expected buy trigger, got {other:?}"),
    }
    assert!(!monitor.hub().is_closed());
}

#[tokio::test]
async fn pairs_are_enumerated_once() {
    let (broker, exchange) = MockBroker::new()
        .with_tickers(vec![tickers(&[("BTC_ETH", 1.0)]), five_pairs(1.0)])
        .into_exchange();
    let monitor = HistoryMonitor::new(exchange, HistoryStrategy::Bollinger, ResourcePool::new(1, 4));

    assert_eq!(monitor.enumerate_pairs().await.unwrap(), 1);
    assert_eq!(monitor.enumerate_pairs().await.unwrap(), 1);
    assert_eq!(broker.call_count("get_tickers"), 1);
}

#[tokio::test(start_paused = true)]
async fn history_loop_keeps_cycling() {
    let (broker, exchange) = MockBroker::new()
        .with_rps(50)
        .with_tickers(vec![tickers(&[("BTC_ETH", 1.0)])])
        .with_candles(pair("BTC_ETH"), flat_candles(10, 1_600_000_000, 300, 1.0))
        .into_exchange();
    let monitor = HistoryMonitor::new(exchange, HistoryStrategy::Bollinger, ResourcePool::new(1, 4));

    monitor.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    monitor.stop();

    assert!(broker.call_count("get_chart_data") >= 3);
}

#[tokio::test(start_paused = true)]
async fn history_loop_recovers_from_failed_enumeration() {
    let (broker, exchange) = MockBroker::new()
        .with_rps(50)
        .with_ticker_errors(vec![ExchangeError::UnexpectedResponse { operation: "get_tickers" }])
        .with_tickers(vec![tickers(&[("BTC_ETH", 1.0)])])
        .with_candles(pair("BTC_ETH"), flat_candles(10, 1_600_000_000, 300, 1.0))
        .into_exchange();
    let monitor = HistoryMonitor::new(exchange, HistoryStrategy::Bollinger, ResourcePool::new(1, 4));

    monitor.start();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(!monitor.hub().is_closed());
    assert_eq!(monitor.indicators().len(), 1);
    assert!(broker.call_count("get_chart_data") >= 1);
    monitor.stop();
}
