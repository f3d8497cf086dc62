//! Indefinite resubmission of read-only calls.

use std::future::Future;

use tracing::warn;

use crate::error::ExchangeError;

/// Re-issue `call` until it succeeds or fails with a non-retryable error.
///
/// No delay is added between attempts: every attempt is a fresh job, so the
/// scheduler's rate limit paces the retries. Only use this for reads.
pub async fn retry_read<T, F, Fut>(
    exchange: &str,
    operation: &'static str,
    mut call: F,
) -> Result<T, ExchangeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExchangeError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                attempt = attempt.saturating_add(1);
                warn!(exchange = %exchange, operation, attempt, error = %e, "Read failed, resubmitting");
            }
            Err(e) => return Err(e),
        }
    }
}
