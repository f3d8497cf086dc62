//! Realized fills and the round-trip ledger built from them.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::CurrencyPair;

/// A realized fill.
///
/// `fee` is a fraction (0.0025 = 0.25%). Fee-adjusted values are derived,
/// never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub pair: CurrencyPair,
    pub rate: f64,
    pub quantity: f64,
    pub fee: f64,
}

impl Trade {
    pub fn new(pair: CurrencyPair, rate: f64, quantity: f64, fee: f64) -> Self {
        Self {
            pair,
            rate,
            quantity,
            fee,
        }
    }

    /// Quantity after the exchange takes its fee.
    #[must_use]
    pub fn effective_quantity(&self) -> f64 {
        self.quantity * (1.0 - self.fee)
    }

    #[must_use]
    pub fn effective_rate(&self) -> f64 {
        self.rate * (1.0 - self.fee)
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} quantity={} rate={}",
            self.pair, self.quantity, self.rate
        )
    }
}

/// One completed buy then sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub buy: Trade,
    pub sell: Trade,
}

impl Transaction {
    pub fn new(buy: Trade, sell: Trade) -> Self {
        Self { buy, sell }
    }

    #[must_use]
    pub fn gain(&self) -> f64 {
        self.sell.effective_quantity() - self.buy.effective_quantity()
    }

    #[must_use]
    pub fn ratio_gain(&self) -> f64 {
        let bought = self.buy.effective_rate();
        (self.sell.effective_rate() - bought) / bought
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gain={} ratio_gain={}", self.gain(), self.ratio_gain())
    }
}

/// Synthetic compounding wallet for paper trading.
///
/// Assumes a single starting currency that every round-trip returns to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionHistory {
    wallet: f64,
    transactions: Vec<Transaction>,
}

impl TransactionHistory {
    pub const DEFAULT_WALLET: f64 = 1.0;

    pub fn new() -> Self {
        Self::with_wallet(Self::DEFAULT_WALLET)
    }

    pub fn with_wallet(wallet: f64) -> Self {
        Self {
            wallet,
            transactions: Vec::new(),
        }
    }

    pub fn record(&mut self, transaction: Transaction) -> f64 {
        self.wallet += transaction.gain();
        self.transactions.push(transaction);
        self.wallet
    }

    #[must_use]
    pub fn wallet(&self) -> f64 {
        self.wallet
    }

    #[must_use]
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }
}

impl Default for TransactionHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> CurrencyPair {
        CurrencyPair::new("BTC", "ETH")
    }

    #[test]
    fn test_effective_quantity_deducts_fee() {
        let trade = Trade::new(pair(), 100.0, 10.0, 0.0025);
        assert!((trade.effective_quantity() - 9.975).abs() < 1e-9);
        assert!((trade.effective_rate() - 99.75).abs() < 1e-9);
    }

    #[test]
    fn test_wallet_compounds_by_gain() {
        let buy = Trade::new(pair(), 1.0, 10.0, 0.0);
        let sell = Trade::new(pair(), 1.2, 12.0, 0.0);
        let mut history = TransactionHistory::with_wallet(5.0);

        let wallet = history.record(Transaction::new(buy, sell));

        assert!((wallet - 7.0).abs() < 1e-12);
        assert_eq!(history.transactions().len(), 1);
    }

    #[test]
    fn test_ratio_gain_uses_fee_adjusted_rates() {
        let buy = Trade::new(pair(), 100.0, 1.0, 0.01);
        let sell = Trade::new(pair(), 110.0, 1.0, 0.01);
        let tx = Transaction::new(buy, sell);
        assert!((tx.ratio_gain() - 0.1).abs() < 1e-12);
    }
}
