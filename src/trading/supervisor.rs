//! Restart-with-backoff around a trading session.

use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use super::state::{StateTracker, TradeState};
use crate::error::TradingError;
use crate::runtime::ExponentialBackoff;

const RESTART_JITTER: f64 = 0.1;

/// Run `session` until it fails fatally, restarting after recoverable
/// failures.
///
/// The backoff resets whenever the failed session finished at least one
/// trading cycle. Returns the fatal error; the tracker is left `Stopped`.
pub(crate) async fn supervise<F, Fut>(
    executor: &str,
    tracker: &StateTracker,
    restart_base: Duration,
    restart_max: Duration,
    mut session: F,
) -> TradingError
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Infallible, TradingError>>,
{
    let mut backoff = ExponentialBackoff::new(restart_base, restart_max, RESTART_JITTER);

    loop {
        let cycles_before = tracker.cycles();
        let error = match session().await {
            Ok(never) => match never {},
            Err(e) => e,
        };

        if error.is_fatal() {
            tracker.set(TradeState::Stopped);
            error!(executor, state = %tracker.current(), error = %error, "Trading stopped");
            return error;
        }

        if tracker.cycles() > cycles_before {
            backoff.reset();
        }
        let delay = backoff.next_delay();
        warn!(
            executor,
            error = %error,
            attempt = backoff.attempt(),
            delay_ms = delay.as_millis() as u64,
            "Trading session failed, restarting after delay"
        );
        sleep(delay).await;
        info!(executor, "Restarting trading session");
    }
}
