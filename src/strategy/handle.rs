//! Shared, lock-guarded per-pair indicator instances.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::{Candle, CurrencyPair, Ticker};

use super::{HistoryIndicator, TickerIndicator};

/// Latest signal of a live indicator, read under one lock.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerSignal {
    pub should_buy: bool,
    pub candidacy_weight: f64,
    pub ticker: Option<Ticker>,
}

/// One live indicator for one pair, shared by the producer and consumers.
///
/// Every read and write takes the same lock, so a consumer never observes a
/// half-applied sample.
pub struct TickerIndicatorHandle {
    pair: CurrencyPair,
    inner: Mutex<Box<dyn TickerIndicator>>,
}

pub type SharedTickerIndicator = Arc<TickerIndicatorHandle>;

impl TickerIndicatorHandle {
    pub fn new(pair: CurrencyPair, indicator: Box<dyn TickerIndicator>) -> Self {
        Self {
            pair,
            inner: Mutex::new(indicator),
        }
    }

    #[must_use]
    pub fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    pub fn add_sample(&self, ticker: Ticker) {
        self.inner.lock().add_sample(ticker);
    }

    #[must_use]
    pub fn should_buy(&self) -> bool {
        self.inner.lock().should_buy()
    }

    #[must_use]
    pub fn should_sell(&self, buy_price: f64, fee: f64) -> bool {
        self.inner.lock().should_sell(buy_price, fee)
    }

    #[must_use]
    pub fn candidacy_weight(&self) -> f64 {
        self.inner.lock().candidacy_weight()
    }

    #[must_use]
    pub fn ticker(&self) -> Option<Ticker> {
        self.inner.lock().ticker().cloned()
    }

    #[must_use]
    pub fn last_price(&self) -> Option<f64> {
        self.inner.lock().ticker().map(|t| t.last)
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.inner.lock().sample_count()
    }

    #[must_use]
    pub fn signal(&self) -> TickerSignal {
        let indicator = self.inner.lock();
        TickerSignal {
            should_buy: indicator.should_buy(),
            candidacy_weight: indicator.candidacy_weight(),
            ticker: indicator.ticker().cloned(),
        }
    }
}

impl std::fmt::Debug for TickerIndicatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickerIndicatorHandle")
            .field("pair", &self.pair)
            .finish_non_exhaustive()
    }
}

/// One candle-history indicator for one pair.
pub struct HistoryIndicatorHandle {
    pair: CurrencyPair,
    inner: Mutex<Box<dyn HistoryIndicator>>,
}

pub type SharedHistoryIndicator = Arc<HistoryIndicatorHandle>;

impl HistoryIndicatorHandle {
    pub fn new(pair: CurrencyPair, indicator: Box<dyn HistoryIndicator>) -> Self {
        Self {
            pair,
            inner: Mutex::new(indicator),
        }
    }

    #[must_use]
    pub fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    /// Returns `(buy_weight, sell_weight)` after the update.
    pub fn analyze(&self, candles: &[Candle], last_price: f64) -> (f64, f64) {
        let mut indicator = self.inner.lock();
        indicator.analyze(candles, last_price);
        (indicator.buy_weight(), indicator.sell_weight())
    }

    #[must_use]
    pub fn buy_weight(&self) -> f64 {
        self.inner.lock().buy_weight()
    }

    #[must_use]
    pub fn sell_weight(&self) -> f64 {
        self.inner.lock().sell_weight()
    }
}

impl std::fmt::Debug for HistoryIndicatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryIndicatorHandle")
            .field("pair", &self.pair)
            .finish_non_exhaustive()
    }
}
