//! Trading state machine states and their observable tracker.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeState {
    Init,
    FetchBalances,
    AwaitCandidate,
    BuyPlacing,
    BuyWatching,
    BuyFilled,
    BuyAbandoned,
    AwaitSellSignal,
    SellPlacing,
    SellWatching,
    SellFilled,
    /// Terminal: a fatal error stopped the machine.
    Stopped,
}

impl TradeState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TradeState::Init => "init",
            TradeState::FetchBalances => "fetch_balances",
            TradeState::AwaitCandidate => "await_candidate",
            TradeState::BuyPlacing => "buy_placing",
            TradeState::BuyWatching => "buy_watching",
            TradeState::BuyFilled => "buy_filled",
            TradeState::BuyAbandoned => "buy_abandoned",
            TradeState::AwaitSellSignal => "await_sell_signal",
            TradeState::SellPlacing => "sell_placing",
            TradeState::SellWatching => "sell_watching",
            TradeState::SellFilled => "sell_filled",
            TradeState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishes state transitions and counts finished cycles.
///
/// A cycle finishes on `SellFilled` or `BuyAbandoned`.
#[derive(Debug, Clone)]
pub struct StateTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug)]
struct TrackerInner {
    tx: watch::Sender<TradeState>,
    cycles: AtomicU64,
}

impl StateTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(TradeState::Init);
        Self {
            inner: Arc::new(TrackerInner {
                tx,
                cycles: AtomicU64::new(0),
            }),
        }
    }

    pub fn set(&self, state: TradeState) {
        let previous = self.inner.tx.send_replace(state);
        if matches!(state, TradeState::SellFilled | TradeState::BuyAbandoned) {
            self.inner.cycles.fetch_add(1, Ordering::Relaxed);
        }
        if previous != state {
            debug!(from = %previous, to = %state, "State transition");
        }
    }

    #[must_use]
    pub fn current(&self) -> TradeState {
        *self.inner.tx.borrow()
    }

    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.inner.cycles.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> watch::Receiver<TradeState> {
        self.inner.tx.subscribe()
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts_finished_cycles() {
        let tracker = StateTracker::new();
        assert_eq!(tracker.current(), TradeState::Init);

        tracker.set(TradeState::BuyAbandoned);
        tracker.set(TradeState::AwaitCandidate);
        tracker.set(TradeState::SellFilled);

        assert_eq!(tracker.current(), TradeState::SellFilled);
        assert_eq!(tracker.cycles(), 2);
    }

    #[tokio::test]
    async fn test_tracker_notifies_watchers() {
        let tracker = StateTracker::new();
        let mut rx = tracker.subscribe();
        tracker.set(TradeState::FetchBalances);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), TradeState::FetchBalances);
    }
}
