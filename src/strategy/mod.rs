//! Signal strategies.
//!
//! Live-ticker indicators ([`TickerIndicator`]) consume one [`Ticker`] per
//! poll; candle-history indicators ([`HistoryIndicator`]) re-analyze a
//! window of candles. Both are selected by name through [`StrategyKind`]
//! and shared across tasks through lock-guarded handles.

mod bollinger;
mod factory;
mod handle;
mod history_bollinger;
pub mod math;
mod reaction;

pub use bollinger::BollingerIndicator;
pub use factory::{HistoryStrategy, StrategyKind, TickerStrategy};
pub use handle::{
    HistoryIndicatorHandle, SharedHistoryIndicator, SharedTickerIndicator, TickerIndicatorHandle,
    TickerSignal,
};
pub use history_bollinger::HistoryBollingerIndicator;
pub use reaction::ReactionIndicator;

use crate::domain::{Candle, Ticker};

/// Rolling signal state for one pair fed by live tickers.
pub trait TickerIndicator: Send {
    fn add_sample(&mut self, ticker: Ticker);

    /// Most recent ticker, if any sample arrived yet.
    fn ticker(&self) -> Option<&Ticker>;

    fn should_buy(&self) -> bool;

    /// Whether a position bought at `buy_price` should be closed now.
    fn should_sell(&self, buy_price: f64, fee: f64) -> bool;

    /// Ranks simultaneous buy candidates. Higher wins.
    fn candidacy_weight(&self) -> f64;

    fn sample_count(&self) -> usize;
}

/// Signal state for one pair recomputed from candle history.
pub trait HistoryIndicator: Send {
    /// `candles` are ordered oldest to newest.
    fn analyze(&mut self, candles: &[Candle], last_price: f64);

    fn buy_weight(&self) -> f64;

    fn sell_weight(&self) -> f64;
}
