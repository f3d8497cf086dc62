//! Exchange-agnostic value types.
//!
//! Everything here is plain data: currencies and pairs, market snapshots,
//! balances, broker order replies and realized trades.

mod balance;
mod currency;
mod id;
mod market;
mod order;
mod trade;

pub use balance::{Balances, TradeStatistic};
pub use currency::{Currency, CurrencyPair, ParsePairError};
pub use id::OrderId;
pub use market::{Candle, OrderBook, OrderBookLevel, Ticker, Tickers, Volumes};
pub use order::{CancelReceipt, OpenOrderStatus, OrderPlacement, OrderSide};
pub use trade::{Trade, Transaction, TransactionHistory};
