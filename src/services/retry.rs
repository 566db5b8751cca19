use std::future::Future;
use std::time::Duration;

use crate::error::AppResult;

const BASE_DELAY_MS: u64 = 500;

/// Run `op` until it succeeds, fails permanently, or `max_retries` extra
/// attempts have been spent.
///
/// Only errors reporting `is_retryable()` are retried, with exponential
/// backoff (500ms, 1s, 2s, ...).
pub async fn with_retry<T, F, Fut>(label: &str, max_retries: u32, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 0u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= max_retries || !e.is_retryable() {
                    return Err(e);
                }

                attempt += 1;
                let delay_ms = BASE_DELAY_MS * 2u64.pow(attempt - 1);
                tracing::warn!(
                    operation = label,
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %e,
                    "Retrying after transient error"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
