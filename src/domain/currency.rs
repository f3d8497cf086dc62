//! Asset symbols and the markets built from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Asset symbol such as `BTC` or `ETH`.
///
/// Compared by name. The inner String is private so every construction
/// goes through [`Currency::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Currency {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Tradable market identified by `(base, quote)`.
///
/// The base is the currency spent to buy and received on sell; prices are
/// quoted in base units per one quote unit. Displays as `BASE_QUOTE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyPair {
    base: Currency,
    quote: Currency,
}

impl CurrencyPair {
    pub fn new(base: impl Into<Currency>, quote: impl Into<Currency>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    #[must_use]
    pub const fn base(&self) -> &Currency {
        &self.base
    }

    #[must_use]
    pub const fn quote(&self) -> &Currency {
        &self.quote
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.base, self.quote)
    }
}

/// Error returned when a `BASE_QUOTE` string is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePairError(String);

impl fmt::Display for ParsePairError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected BASE_QUOTE, got {:?}", self.0)
    }
}

impl std::error::Error for ParsePairError {}

impl FromStr for CurrencyPair {
    type Err = ParsePairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('_') {
            Some((base, quote))
                if !base.is_empty() && !quote.is_empty() && !quote.contains('_') =>
            {
                Ok(Self::new(base, quote))
            }
            _ => Err(ParsePairError(s.to_string())),
        }
    }
}
