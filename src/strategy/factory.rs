//! Named strategy selection.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::bollinger::BollingerIndicator;
use super::history_bollinger::HistoryBollingerIndicator;
use super::reaction::ReactionIndicator;
use super::{HistoryIndicator, TickerIndicator};

const BOLLINGER_INTERVAL_MINS: usize = 1;
const BOLLINGER_PERIODS: usize = 1;
const REACTION_INTERVAL_SECS: usize = 45;

const HISTORY_CANDLE_PERIOD_SECS: u32 = 300;
const HISTORY_AMOUNT_OF_CANDLES: u32 = 20;

/// Strategy name as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Bollinger,
    Reaction,
    HistoryBollinger,
}

impl StrategyKind {
    #[must_use]
    pub const fn ticker(self) -> Option<TickerStrategy> {
        match self {
            StrategyKind::Bollinger => Some(TickerStrategy::Bollinger),
            StrategyKind::Reaction => Some(TickerStrategy::Reaction),
            StrategyKind::HistoryBollinger => None,
        }
    }

    #[must_use]
    pub const fn history(self) -> Option<HistoryStrategy> {
        match self {
            StrategyKind::HistoryBollinger => Some(HistoryStrategy::Bollinger),
            _ => None,
        }
    }
}

/// Live-ticker strategies, sized from the exchange's request rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickerStrategy {
    Bollinger,
    Reaction,
}

impl TickerStrategy {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            TickerStrategy::Bollinger => "Bollinger",
            TickerStrategy::Reaction => "Reaction",
        }
    }

    /// Samples held by one indicator, which is also how many polls are
    /// awaited before trading starts.
    #[must_use]
    pub fn amount_of_samples(self, requests_per_second: u32) -> usize {
        let rps = requests_per_second.max(1) as usize;
        match self {
            TickerStrategy::Bollinger => rps * 60 * BOLLINGER_INTERVAL_MINS * BOLLINGER_PERIODS,
            TickerStrategy::Reaction => rps * REACTION_INTERVAL_SECS,
        }
    }

    #[must_use]
    pub fn create(self, requests_per_second: u32) -> Box<dyn TickerIndicator> {
        let window = self.amount_of_samples(requests_per_second);
        match self {
            TickerStrategy::Bollinger => Box::new(BollingerIndicator::new(window)),
            TickerStrategy::Reaction => Box::new(ReactionIndicator::new(window)),
        }
    }
}

impl fmt::Display for TickerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Candle-history strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryStrategy {
    Bollinger,
}

impl HistoryStrategy {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            HistoryStrategy::Bollinger => "History Bollinger",
        }
    }

    #[must_use]
    pub const fn candle_period_secs(self) -> u32 {
        match self {
            HistoryStrategy::Bollinger => HISTORY_CANDLE_PERIOD_SECS,
        }
    }

    #[must_use]
    pub const fn amount_of_candles(self) -> u32 {
        match self {
            HistoryStrategy::Bollinger => HISTORY_AMOUNT_OF_CANDLES,
        }
    }

    /// Seconds of history requested per analysis.
    #[must_use]
    pub const fn interval_secs(self) -> i64 {
        self.candle_period_secs() as i64 * self.amount_of_candles() as i64
    }

    #[must_use]
    pub fn create(self) -> Box<dyn HistoryIndicator> {
        match self {
            HistoryStrategy::Bollinger => Box::new(HistoryBollingerIndicator::new()),
        }
    }
}

impl fmt::Display for HistoryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
