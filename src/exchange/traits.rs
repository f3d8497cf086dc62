//! The broker capability every concrete exchange client implements.

use async_trait::async_trait;

use crate::domain::{
    Balances, CancelReceipt, Candle, CurrencyPair, OpenOrderStatus, OrderBook, OrderId,
    OrderPlacement, Tickers, Volumes,
};
use crate::error::ExchangeError;

/// Raw access to one exchange.
///
/// Nothing outside [`ExchangeMonitor`](super::ExchangeMonitor) calls these
/// methods directly; everything else goes through the rate-limited
/// [`Exchange`](super::Exchange) facade. Operations a broker cannot serve
/// resolve with [`ExchangeError::Unsupported`].
#[async_trait]
pub trait Broker: Send + Sync {
    /// Exchange name for logging.
    fn name(&self) -> &str;

    /// Maximum outbound requests per second.
    fn requests_per_second_limit(&self) -> u32;

    /// Trading fee as a fraction of the traded amount.
    fn fee(&self) -> f64;

    /// Whether credentials are present. Live trading refuses to start otherwise.
    fn check_config(&self) -> bool;

    async fn get_tickers(&self) -> Result<Tickers, ExchangeError>;

    async fn get_24_hour_volume(&self) -> Result<Volumes, ExchangeError> {
        Err(ExchangeError::Unsupported {
            operation: "get_24_hour_volume",
        })
    }

    /// Candles covering `[start, end]` (unix seconds), oldest first.
    async fn get_chart_data(
        &self,
        pair: &CurrencyPair,
        start: i64,
        end: i64,
        period_secs: u32,
    ) -> Result<Vec<Candle>, ExchangeError>;

    async fn get_order_book(
        &self,
        _pair: &CurrencyPair,
        _depth: usize,
    ) -> Result<OrderBook, ExchangeError> {
        Err(ExchangeError::Unsupported {
            operation: "get_order_book",
        })
    }

    async fn get_open_order(&self, order_id: &OrderId) -> Result<OpenOrderStatus, ExchangeError>;

    async fn get_open_orders(
        &self,
        _pair: &CurrencyPair,
    ) -> Result<Vec<OpenOrderStatus>, ExchangeError> {
        Err(ExchangeError::Unsupported {
            operation: "get_open_orders",
        })
    }

    async fn place_buy_order(
        &self,
        pair: &CurrencyPair,
        quantity: f64,
        rate: f64,
    ) -> Result<OrderPlacement, ExchangeError>;

    async fn place_sell_order(
        &self,
        pair: &CurrencyPair,
        quantity: f64,
        rate: f64,
    ) -> Result<OrderPlacement, ExchangeError>;

    async fn cancel_open_order(&self, order_id: &OrderId) -> Result<CancelReceipt, ExchangeError>;

    async fn get_balances(&self) -> Result<Balances, ExchangeError>;
}
