//! The signal a position is opened and closed on.

use async_trait::async_trait;

use crate::domain::CurrencyPair;
use crate::error::ExchangeError;
use crate::exchange::{retry_read, Exchange};
use crate::strategy::{SharedHistoryIndicator, SharedTickerIndicator};

/// Price source and buy preference for the pair being traded.
#[async_trait]
pub trait PositionSignal: Send + Sync {
    fn pair(&self) -> &CurrencyPair;

    /// Price to trade at now. `None` when the pair has no current quote.
    async fn latest_rate(&self) -> Result<Option<f64>, ExchangeError>;

    /// Whether the strategy still favours holding a position.
    fn favours_buy(&self) -> bool;
}

/// A live indicator; its latest ticker is the price.
pub struct LiveSignal {
    indicator: SharedTickerIndicator,
}

impl LiveSignal {
    pub fn new(indicator: SharedTickerIndicator) -> Self {
        Self { indicator }
    }
}

#[async_trait]
impl PositionSignal for LiveSignal {
    fn pair(&self) -> &CurrencyPair {
        self.indicator.pair()
    }

    async fn latest_rate(&self) -> Result<Option<f64>, ExchangeError> {
        Ok(self.indicator.last_price())
    }

    fn favours_buy(&self) -> bool {
        self.indicator.should_buy()
    }
}

/// A history indicator; the price is read from a fresh ticker poll.
pub struct HistorySignal {
    indicator: SharedHistoryIndicator,
    exchange: Exchange,
}

impl HistorySignal {
    pub fn new(indicator: SharedHistoryIndicator, exchange: Exchange) -> Self {
        Self {
            indicator,
            exchange,
        }
    }
}

#[async_trait]
impl PositionSignal for HistorySignal {
    fn pair(&self) -> &CurrencyPair {
        self.indicator.pair()
    }

    async fn latest_rate(&self) -> Result<Option<f64>, ExchangeError> {
        let tickers = retry_read(self.exchange.name(), "get_tickers", || {
            self.exchange.get_tickers()
        })
        .await?;
        Ok(tickers.get(self.indicator.pair()).map(|t| t.last))
    }

    fn favours_buy(&self) -> bool {
        self.indicator.buy_weight() > 0.0
    }
}
