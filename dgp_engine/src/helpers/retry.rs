use std::{fmt::Display, future::Future, time::Duration};

use log::*;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RetryError<E: Display> {
    #[error("The call timed out after {0:?}")]
    TimedOut(Duration),
    #[error("{0}")]
    Failed(E),
}

/// Runs `op` with a time limit. A failure or timeout is retried exactly once before it is returned.
pub async fn with_retry<T, E, F, Fut>(label: &str, timeout: Duration, mut op: F) -> Result<T, RetryError<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_error = RetryError::TimedOut(timeout);
    for attempt in 1..=2 {
        match tokio::time::timeout(timeout, op()).await {
            Ok(Ok(v)) => return Ok(v),
            Ok(Err(e)) => {
                warn!("📦️ {label} failed on attempt {attempt}. {e}");
                last_error = RetryError::Failed(e);
            },
            Err(_) => {
                warn!("📦️ {label} timed out on attempt {attempt} after {timeout:?}");
                last_error = RetryError::TimedOut(timeout);
            },
        }
    }
    Err(last_error)
}
