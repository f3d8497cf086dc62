//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`broker`]: [`MockBroker`](broker::MockBroker), a scripted broker
//!   with a timestamped call log.
//! - [`domain`]: Builders for pairs, tickers, candles and balances.
//! - [`config`]: Canonical fast settings for state machine tests.

pub mod broker;
pub mod config;
pub mod domain;
