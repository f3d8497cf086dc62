//! Holdings snapshots and the deltas between them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Currency;

/// Per-currency amounts as reported by one `get_balances` call.
///
/// Always re-fetched before sizing an order, never updated in place by
/// the trading loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    amounts: BTreeMap<Currency, f64>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, currency: impl Into<Currency>, amount: f64) -> Self {
        self.set(currency, amount);
        self
    }

    pub fn set(&mut self, currency: impl Into<Currency>, amount: f64) {
        self.amounts.insert(currency.into(), amount);
    }

    /// Amount held of `currency`; zero when the currency is absent.
    #[must_use]
    pub fn amount(&self, currency: &Currency) -> f64 {
        self.amounts.get(currency).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Currency, f64)> {
        self.amounts.iter().map(|(c, a)| (c, *a))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    /// Per-currency changes from `self` (old) to `newer`.
    ///
    /// Covers the union of both snapshots; unchanged currencies are skipped.
    #[must_use]
    pub fn diff(&self, newer: &Balances) -> Vec<TradeStatistic> {
        let mut currencies: Vec<&Currency> = self.amounts.keys().collect();
        currencies.extend(newer.amounts.keys());
        currencies.sort();
        currencies.dedup();

        currencies
            .into_iter()
            .filter_map(|currency| {
                let old_amount = self.amount(currency);
                let new_amount = newer.amount(currency);
                (old_amount != new_amount).then(|| TradeStatistic {
                    currency: currency.clone(),
                    old_amount,
                    new_amount,
                })
            })
            .collect()
    }
}

/// Change of one currency's holdings across a round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeStatistic {
    pub currency: Currency,
    pub old_amount: f64,
    pub new_amount: f64,
}

impl TradeStatistic {
    #[must_use]
    pub fn amount_gain(&self) -> f64 {
        self.new_amount - self.old_amount
    }

    /// Relative change. Infinite when the old amount was zero.
    #[must_use]
    pub fn ratio_gain(&self) -> f64 {
        (self.new_amount - self.old_amount) / self.old_amount
    }
}

impl fmt::Display for TradeStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} ({:+})",
            self.currency,
            self.old_amount,
            self.new_amount,
            self.amount_gain()
        )
    }
}
