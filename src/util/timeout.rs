//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::TandemError;

/// Wrap a future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, TandemError>>,
) -> Result<T, TandemError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(TandemError::Timeout(duration.as_millis() as u64)),
    }
}

/// Apply `duration` when present, otherwise await the future unbounded.
pub async fn maybe_with_timeout<T>(
    duration: Option<Duration>,
    future: impl Future<Output = Result<T, TandemError>>,
) -> Result<T, TandemError> {
    match duration {
        Some(duration) => with_timeout(duration, future).await,
        None => future.await,
    }
}
