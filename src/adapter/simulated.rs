//! In-process random-walk market.
//!
//! Each ticker poll advances every pair's price by one seeded random step.
//! Resting orders fill when the walk crosses their rate, and candles are
//! bucketed from the recorded walk, which is backfilled at construction so
//! history strategies have data from the first cycle.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{
    Balances, CancelReceipt, Candle, CurrencyPair, OpenOrderStatus, OrderBook, OrderBookLevel,
    OrderId, OrderPlacement, OrderSide, Ticker, Tickers, Volumes,
};
use crate::error::ExchangeError;
use crate::exchange::Broker;

const BACKFILL_POINTS: usize = 720;
const BACKFILL_STEP_SECS: i64 = 10;
const MAX_POINTS: usize = 20_000;
const SPREAD: f64 = 0.0005;
const BOOK_STEP: f64 = 0.001;
const VOLUME_RANGE: (f64, f64) = (400.0, 1_200.0);

/// Everything needed to build a [`SimulatedBroker`].
#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub name: String,
    pub requests_per_second: u32,
    pub fee: f64,
    pub pairs: Vec<CurrencyPair>,
    pub starting_price: f64,
    /// Largest relative price move per poll.
    pub volatility: f64,
    pub balances: Balances,
    pub seed: u64,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Point {
    time: i64,
    price: f64,
    volume: f64,
}

#[derive(Debug, Clone)]
struct RestingOrder {
    pair: CurrencyPair,
    side: OrderSide,
    quantity: f64,
    rate: f64,
    filled: bool,
}

#[derive(Debug)]
struct Market {
    rng: StdRng,
    prices: BTreeMap<CurrencyPair, f64>,
    walks: BTreeMap<CurrencyPair, VecDeque<Point>>,
    balances: Balances,
    orders: HashMap<OrderId, RestingOrder>,
}

impl Market {
    fn step(&mut self, volatility: f64) -> Vec<(CurrencyPair, f64, f64)> {
        let now = Utc::now().timestamp();
        let mut moved = Vec::with_capacity(self.prices.len());
        for (pair, price) in &mut self.prices {
            let change = self.rng.gen_range(-volatility..=volatility);
            *price = (*price * (1.0 + change)).max(f64::EPSILON);
            let volume = self.rng.gen_range(VOLUME_RANGE.0..VOLUME_RANGE.1);

            let walk = self.walks.entry(pair.clone()).or_default();
            walk.push_back(Point {
                time: now,
                price: *price,
                volume,
            });
            while walk.len() > MAX_POINTS {
                walk.pop_front();
            }
            moved.push((pair.clone(), *price, volume));
        }
        moved
    }

    /// Fill resting orders the latest prices crossed.
    fn match_orders(&mut self, fee: f64) {
        for (order_id, order) in self.orders.iter_mut().filter(|(_, o)| !o.filled) {
            let Some(&price) = self.prices.get(&order.pair) else {
                continue;
            };
            let crossed = match order.side {
                OrderSide::Buy => price <= order.rate,
                OrderSide::Sell => price >= order.rate,
            };
            if !crossed {
                continue;
            }

            order.filled = true;
            let base = order.pair.base().clone();
            let quote = order.pair.quote().clone();
            let (base_delta, quote_delta) = match order.side {
                OrderSide::Buy => (-(order.quantity * order.rate * (1.0 + fee)), order.quantity),
                OrderSide::Sell => (order.quantity * order.rate * (1.0 - fee), -order.quantity),
            };
            let new_base = (self.balances.amount(&base) + base_delta).max(0.0);
            let new_quote = (self.balances.amount(&quote) + quote_delta).max(0.0);
            self.balances.set(base, new_base);
            self.balances.set(quote, new_quote);
            debug!(order_id = %order_id, pair = %order.pair, side = %order.side, rate = order.rate, "Simulated fill");
        }
    }
}

/// A [`Broker`] backed by a seeded random walk instead of a remote API.
#[derive(Debug)]
pub struct SimulatedBroker {
    name: String,
    requests_per_second: u32,
    fee: f64,
    volatility: f64,
    configured: bool,
    market: Mutex<Market>,
}

impl SimulatedBroker {
    pub fn new(params: SimulationParams) -> Self {
        let mut rng = StdRng::seed_from_u64(params.seed);
        let volatility = params.volatility.abs();
        let now = Utc::now().timestamp();

        let mut prices = BTreeMap::new();
        let mut walks = BTreeMap::new();
        for pair in params.pairs {
            // Walk backwards from the starting price so the latest point is it.
            let mut price = params.starting_price;
            let mut walk = VecDeque::with_capacity(BACKFILL_POINTS);
            for i in 0..BACKFILL_POINTS {
                walk.push_front(Point {
                    time: now - BACKFILL_STEP_SECS * i as i64,
                    price,
                    volume: rng.gen_range(VOLUME_RANGE.0..VOLUME_RANGE.1),
                });
                let change = rng.gen_range(-volatility..=volatility);
                price = (price / (1.0 + change)).max(f64::EPSILON);
            }
            prices.insert(pair.clone(), params.starting_price);
            walks.insert(pair, walk);
        }

        let configured = params.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
            && params.api_secret.as_deref().is_some_and(|s| !s.trim().is_empty());

        info!(
            exchange = %params.name,
            pairs = prices.len(),
            seed = params.seed,
            "Simulated market created"
        );

        Self {
            name: params.name,
            requests_per_second: params.requests_per_second,
            fee: params.fee,
            volatility,
            configured,
            market: Mutex::new(Market {
                rng,
                prices,
                walks,
                balances: params.balances,
                orders: HashMap::new(),
            }),
        }
    }

    /// Current price of `pair`, without advancing the walk.
    #[must_use]
    pub fn price(&self, pair: &CurrencyPair) -> Option<f64> {
        self.market.lock().prices.get(pair).copied()
    }

    fn place(
        &self,
        side: OrderSide,
        pair: &CurrencyPair,
        quantity: f64,
        rate: f64,
    ) -> Result<OrderPlacement, ExchangeError> {
        let mut market = self.market.lock();
        if !market.prices.contains_key(pair) {
            return Err(unknown_pair(pair));
        }

        let (currency, needed) = match side {
            OrderSide::Buy => (pair.base(), quantity * rate * (1.0 + self.fee)),
            OrderSide::Sell => (pair.quote(), quantity),
        };
        let available = market.balances.amount(currency);
        // Tolerate float noise from sizing against the full balance.
        if needed > available * (1.0 + 1e-9) {
            return Ok(OrderPlacement::NotPlaced {
                reason: format!("insufficient {currency}: need {needed}, have {available}"),
            });
        }

        let order_id = OrderId::new(Uuid::new_v4().to_string());
        market.orders.insert(
            order_id.clone(),
            RestingOrder {
                pair: pair.clone(),
                side,
                quantity,
                rate,
                filled: false,
            },
        );
        market.match_orders(self.fee);
        Ok(OrderPlacement::Placed(order_id))
    }
}

#[async_trait]
impl Broker for SimulatedBroker {
    fn name(&self) -> &str {
        &self.name
    }

    fn requests_per_second_limit(&self) -> u32 {
        self.requests_per_second
    }

    fn fee(&self) -> f64 {
        self.fee
    }

    fn check_config(&self) -> bool {
        self.configured
    }

    async fn get_tickers(&self) -> Result<Tickers, ExchangeError> {
        let mut market = self.market.lock();
        let moved = market.step(self.volatility);
        market.match_orders(self.fee);

        let now = Utc::now();
        Ok(moved
            .into_iter()
            .map(|(pair, price, volume)| {
                let ticker = Ticker::new(pair.clone(), price)
                    .with_spread(price * (1.0 - SPREAD), price * (1.0 + SPREAD))
                    .with_volume(volume, volume / price)
                    .at(now);
                (pair, ticker)
            })
            .collect())
    }

    async fn get_24_hour_volume(&self) -> Result<Volumes, ExchangeError> {
        let cutoff = Utc::now().timestamp() - 24 * 60 * 60;
        let market = self.market.lock();
        let mut volumes = Volumes::default();
        for (pair, walk) in &market.walks {
            let (base, quote) = walk
                .iter()
                .filter(|p| p.time >= cutoff)
                .fold((0.0, 0.0), |(b, q), p| (b + p.volume, q + p.volume / p.price));
            volumes.pairs.insert(pair.clone(), (base, quote));
            *volumes.totals.entry(pair.base().clone()).or_insert(0.0) += base;
            *volumes.totals.entry(pair.quote().clone()).or_insert(0.0) += quote;
        }
        Ok(volumes)
    }

    async fn get_chart_data(
        &self,
        pair: &CurrencyPair,
        start: i64,
        end: i64,
        period_secs: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let market = self.market.lock();
        let walk = market
            .walks
            .get(pair)
            .ok_or_else(|| unknown_pair(pair))?;
        Ok(bucket_candles(walk, start, end, i64::from(period_secs)))
    }

    async fn get_order_book(&self, pair: &CurrencyPair, depth: usize) -> Result<OrderBook, ExchangeError> {
        let price = self
            .price(pair)
            .ok_or_else(|| unknown_pair(pair))?;
        let level = |i: usize, sign: f64| OrderBookLevel {
            rate: price * (1.0 + sign * (SPREAD + BOOK_STEP * i as f64)),
            quantity: 1.0 + i as f64,
        };
        Ok(OrderBook {
            pair: pair.clone(),
            bids: (0..depth).map(|i| level(i, -1.0)).collect(),
            asks: (0..depth).map(|i| level(i, 1.0)).collect(),
        })
    }

    async fn get_open_order(&self, order_id: &OrderId) -> Result<OpenOrderStatus, ExchangeError> {
        let mut market = self.market.lock();
        match market.orders.get(order_id) {
            // A closed order is reported once, then forgotten.
            Some(order) if order.filled => {
                market.orders.remove(order_id);
                Ok(OpenOrderStatus::closed(order_id.clone()))
            }
            Some(_) => Ok(OpenOrderStatus::open(order_id.clone())),
            None => Err(ExchangeError::InvalidArgument {
                field: "order_id",
                reason: format!("unknown order {order_id}"),
            }),
        }
    }

    async fn get_open_orders(&self, pair: &CurrencyPair) -> Result<Vec<OpenOrderStatus>, ExchangeError> {
        let market = self.market.lock();
        Ok(market
            .orders
            .iter()
            .filter(|(_, o)| !o.filled && &o.pair == pair)
            .map(|(id, _)| OpenOrderStatus::open(id.clone()))
            .collect())
    }

    async fn place_buy_order(
        &self,
        pair: &CurrencyPair,
        quantity: f64,
        rate: f64,
    ) -> Result<OrderPlacement, ExchangeError> {
        self.place(OrderSide::Buy, pair, quantity, rate)
    }

    async fn place_sell_order(
        &self,
        pair: &CurrencyPair,
        quantity: f64,
        rate: f64,
    ) -> Result<OrderPlacement, ExchangeError> {
        self.place(OrderSide::Sell, pair, quantity, rate)
    }

    async fn cancel_open_order(&self, order_id: &OrderId) -> Result<CancelReceipt, ExchangeError> {
        let mut market = self.market.lock();
        let canceled = match market.orders.get(order_id) {
            Some(order) if !order.filled => {
                market.orders.remove(order_id);
                true
            }
            _ => false,
        };
        Ok(CancelReceipt { canceled })
    }

    async fn get_balances(&self) -> Result<Balances, ExchangeError> {
        Ok(self.market.lock().balances.clone())
    }
}

fn unknown_pair(pair: &CurrencyPair) -> ExchangeError {
    ExchangeError::InvalidArgument {
        field: "pair",
        reason: format!("{pair} is not listed"),
    }
}

/// Aggregate `walk` into `period`-second candles covering `[start, end]`.
///
/// Buckets with no points repeat the previous close as a flat candle.
fn bucket_candles(walk: &VecDeque<Point>, start: i64, end: i64, period: i64) -> Vec<Candle> {
    let mut carry = walk
        .iter()
        .take_while(|p| p.time < start)
        .last()
        .or_else(|| walk.front())
        .map_or(0.0, |p| p.price);

    let mut candles = Vec::new();
    let mut bucket = start;
    while bucket <= end {
        let next = bucket + period;
        let mut points = walk.iter().filter(|p| p.time >= bucket && p.time < next);
        let candle = match points.next() {
            None => Candle::flat(bucket, carry),
            Some(first) => {
                let mut candle = Candle::flat(bucket, first.price);
                candle.volume = first.volume;
                let mut weighted = first.price * first.volume;
                for p in points {
                    candle.high = candle.high.max(p.price);
                    candle.low = candle.low.min(p.price);
                    candle.close = p.price;
                    candle.volume += p.volume;
                    weighted += p.price * p.volume;
                }
                candle.quote_volume = candle.volume / candle.close;
                if candle.volume > 0.0 {
                    candle.weighted_average = weighted / candle.volume;
                }
                candle
            }
        };
        carry = candle.close;
        candles.push(candle);
        bucket = next;
    }
    candles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SimulationParams {
        SimulationParams {
            name: "simulated".into(),
            requests_per_second: 6,
            fee: 0.0,
            pairs: vec![CurrencyPair::new("BTC", "ETH"), CurrencyPair::new("BTC", "LTC")],
            starting_price: 0.05,
            volatility: 0.01,
            balances: Balances::new().with("BTC", 1.0),
            seed: 7,
            api_key: None,
            api_secret: None,
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_walk() {
        let a = SimulatedBroker::new(params());
        let b = SimulatedBroker::new(params());
        for _ in 0..20 {
            let ta = a.get_tickers().await.unwrap();
            let tb = b.get_tickers().await.unwrap();
            for (pair, ticker) in &ta {
                assert_eq!(ticker.last, tb[pair].last);
            }
        }
    }

    #[tokio::test]
    async fn test_buy_above_market_fills_immediately() {
        let broker = SimulatedBroker::new(params());
        let pair = CurrencyPair::new("BTC", "ETH");
        let price = broker.price(&pair).unwrap();

        let placed = broker.place_buy_order(&pair, 1.0, price * 1.1).await.unwrap();
        let order_id = placed.order_id().unwrap().clone();
        let status = broker.get_open_order(&order_id).await.unwrap();

        assert!(status.closed);
        let balances = broker.get_balances().await.unwrap();
        assert!((balances.amount(pair.quote()) - 1.0).abs() < 1e-12);
        assert!(!broker.cancel_open_order(&order_id).await.unwrap().canceled);
    }

    #[tokio::test]
    async fn test_filled_orders_are_dropped_once_reported() {
        let broker = SimulatedBroker::new(params());
        let pair = CurrencyPair::new("BTC", "ETH");
        let price = broker.price(&pair).unwrap();

        for _ in 0..5 {
            let placed = broker.place_buy_order(&pair, 0.1, price * 1.1).await.unwrap();
            let order_id = placed.order_id().unwrap().clone();
            assert!(broker.get_open_order(&order_id).await.unwrap().closed);
        }

        assert!(broker.market.lock().orders.is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_funds_not_placed() {
        let broker = SimulatedBroker::new(params());
        let pair = CurrencyPair::new("BTC", "ETH");
        let placement = broker.place_buy_order(&pair, 1_000.0, 1.0).await.unwrap();
        assert!(!placement.is_placed());
    }

    #[tokio::test]
    async fn test_resting_order_can_be_canceled() {
        let broker = SimulatedBroker::new(params());
        let pair = CurrencyPair::new("BTC", "ETH");
        let price = broker.price(&pair).unwrap();

        let placed = broker.place_buy_order(&pair, 1.0, price * 0.5).await.unwrap();
        let order_id = placed.order_id().unwrap().clone();

        assert_eq!(broker.get_open_orders(&pair).await.unwrap().len(), 1);
        assert!(broker.cancel_open_order(&order_id).await.unwrap().canceled);
        assert!(broker.get_open_order(&order_id).await.is_err());
    }

    #[tokio::test]
    async fn test_chart_data_covers_requested_range() {
        let broker = SimulatedBroker::new(params());
        let pair = CurrencyPair::new("BTC", "ETH");
        let end = Utc::now().timestamp();
        let start = end - 6_000;

        let candles = broker.get_chart_data(&pair, start, end, 300).await.unwrap();

        assert_eq!(candles.len(), 21);
        assert!(candles.windows(2).all(|w| w[0].date < w[1].date));
        assert!(candles.iter().all(|c| c.low <= c.close && c.close <= c.high));
    }

    #[test]
    fn test_credentials_drive_check_config() {
        assert!(!SimulatedBroker::new(params()).check_config());

        let mut with_keys = params();
        with_keys.api_key = Some("key".into());
        with_keys.api_secret = Some("secret".into());
        assert!(SimulatedBroker::new(with_keys).check_config());
    }
}
