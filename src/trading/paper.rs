//! Paper trading against a synthetic compounding wallet.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use super::execution::{ExecutionMode, OrderExecution};
use super::signal::PositionSignal;
use super::state::{StateTracker, TradeState};
use crate::domain::{Balances, Currency, Trade, Transaction, TransactionHistory};
use crate::error::ExchangeError;

/// Fills every buy and sell instantly at the observed price.
///
/// Nothing reaches the broker's order book. Trades are recorded in wallet
/// units: a buy spends the whole wallet, and the matching sell returns it
/// scaled by the price move, so the wallet compounds across round-trips.
///
/// Fees scale the recorded gain but are never charged on their own: a
/// round-trip at a flat price leaves the wallet unchanged.
#[derive(Debug)]
pub struct PaperExecution {
    fee: f64,
    wallet_currency: Currency,
    history: Mutex<TransactionHistory>,
}

impl PaperExecution {
    pub fn new(fee: f64, wallet_currency: impl Into<Currency>) -> Self {
        Self::with_history(fee, wallet_currency, TransactionHistory::new())
    }

    pub fn with_history(
        fee: f64,
        wallet_currency: impl Into<Currency>,
        history: TransactionHistory,
    ) -> Self {
        Self {
            fee,
            wallet_currency: wallet_currency.into(),
            history: Mutex::new(history),
        }
    }

    #[must_use]
    pub fn wallet(&self) -> f64 {
        self.history.lock().wallet()
    }

    #[must_use]
    pub fn wallet_currency(&self) -> &Currency {
        &self.wallet_currency
    }

    /// Snapshot of the ledger so far.
    #[must_use]
    pub fn history(&self) -> TransactionHistory {
        self.history.lock().clone()
    }

    fn wallet_balances(&self) -> Balances {
        Balances::new().with(self.wallet_currency.clone(), self.wallet())
    }
}

#[async_trait]
impl OrderExecution for PaperExecution {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Paper
    }

    async fn balances(&self) -> Result<Balances, ExchangeError> {
        Ok(self.wallet_balances())
    }

    async fn buy(
        &self,
        signal: &dyn PositionSignal,
        balances: &Balances,
        tracker: &StateTracker,
    ) -> Result<Option<Trade>, ExchangeError> {
        tracker.set(TradeState::BuyPlacing);
        let Some(rate) = signal.latest_rate().await? else {
            return Ok(None);
        };
        let pair = signal.pair().clone();
        let spent = balances.amount(pair.base());
        info!(pair = %pair, rate, spent, "Paper buy");
        Ok(Some(Trade::new(pair, rate, spent, self.fee)))
    }

    async fn sell(
        &self,
        signal: &dyn PositionSignal,
        bought: &Trade,
        tracker: &StateTracker,
    ) -> Result<Option<Trade>, ExchangeError> {
        tracker.set(TradeState::SellPlacing);
        let Some(rate) = signal.latest_rate().await? else {
            return Ok(None);
        };
        let returned = bought.quantity * rate / bought.rate;
        info!(pair = %bought.pair, rate, returned, "Paper sell");
        Ok(Some(Trade::new(bought.pair.clone(), rate, returned, self.fee)))
    }

    async fn settle(
        &self,
        _before: &Balances,
        bought: &Trade,
        sold: &Trade,
    ) -> Result<Balances, ExchangeError> {
        let transaction = Transaction::new(bought.clone(), sold.clone());
        let wallet = self.history.lock().record(transaction.clone());
        info!(
            pair = %bought.pair,
            gain = transaction.gain(),
            ratio_gain = transaction.ratio_gain(),
            wallet,
            "Round-trip recorded"
        );
        Ok(self.wallet_balances())
    }
}
