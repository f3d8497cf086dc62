//! Market data producers and their broadcast hub.

use std::time::Duration;

use crate::runtime::ExponentialBackoff;

mod history_monitor;
mod hub;
mod ticker_monitor;

pub use history_monitor::{CycleReport, HistoryEvent, HistoryMonitor};
pub use hub::{ListenerHub, Subscription};
pub use ticker_monitor::{SampleBatch, TickerMonitor};

/// Delay between retries of a failed poll or cycle. Only `stop()` or a
/// stopped scheduler ends a producer.
fn producer_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(30), 0.1)
}
