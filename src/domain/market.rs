//! Market snapshots: tickers, candles, order books and volumes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Currency, CurrencyPair};

/// Latest traded price and volume snapshot for one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub pair: CurrencyPair,
    pub last: f64,
    /// Highest bid.
    pub bid: f64,
    /// Lowest ask.
    pub ask: f64,
    pub base_volume: f64,
    pub quote_volume: f64,
    pub timestamp: DateTime<Utc>,
}

impl Ticker {
    pub fn new(pair: CurrencyPair, last: f64) -> Self {
        Self {
            pair,
            last,
            bid: last,
            ask: last,
            base_volume: 0.0,
            quote_volume: 0.0,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_spread(mut self, bid: f64, ask: f64) -> Self {
        self.bid = bid;
        self.ask = ask;
        self
    }

    #[must_use]
    pub fn with_volume(mut self, base_volume: f64, quote_volume: f64) -> Self {
        self.base_volume = base_volume;
        self.quote_volume = quote_volume;
        self
    }

    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// All tickers returned by one poll, keyed and ordered by pair.
pub type Tickers = BTreeMap<CurrencyPair, Ticker>;

/// One OHLCV bar. Sequences are ordered oldest to newest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time, unix seconds.
    pub date: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub quote_volume: f64,
    pub weighted_average: f64,
}

impl Candle {
    /// A flat bar where every price equals `price`.
    pub fn flat(date: i64, price: f64) -> Self {
        Self {
            date,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
            quote_volume: 0.0,
            weighted_average: price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub rate: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub pair: CurrencyPair,
    /// Best bid first.
    pub bids: Vec<OrderBookLevel>,
    /// Best ask first.
    pub asks: Vec<OrderBookLevel>,
}

impl OrderBook {
    #[must_use]
    pub fn best_bid(&self) -> Option<&OrderBookLevel> {
        self.bids.first()
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<&OrderBookLevel> {
        self.asks.first()
    }
}

/// Rolling 24 hour volume per pair, plus per-currency totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Volumes {
    pub pairs: BTreeMap<CurrencyPair, (f64, f64)>,
    pub totals: BTreeMap<Currency, f64>,
}
