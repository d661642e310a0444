use std::{future::Future, time::Duration};

use crate::errors::{AppError, Result};

/// An elapsed call is retried once; the second timeout is final.
pub const MAX_ATTEMPTS: u32 = 2;

/// Runs `operation` under `limit`, rebuilding the future for the retry.
///
/// Only for calls that are safe to repeat: an abandoned attempt may still
/// complete.
pub async fn with_timeout<T, F, Fut>(operation: &str, limit: Duration, mut make: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        match tokio::time::timeout(limit, make()).await {
            Ok(result) => return result,
            Err(_) => {
                tracing::warn!(operation, attempt, limit_ms = limit.as_millis() as u64, "call timed out");
            }
        }
    }

    Err(AppError::Timeout(format!(
        "{} did not finish within {:?} after {} attempts",
        operation, limit, MAX_ATTEMPTS
    )))
}

/// Runs `future` once under `limit`. For writes that must not be duplicated
/// and for blocking work that keeps running after it is abandoned.
pub async fn with_deadline<T, Fut>(operation: &str, limit: Duration, future: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, limit_ms = limit.as_millis() as u64, "call timed out");
            Err(AppError::Timeout(format!(
                "{} did not finish within {:?}",
                operation, limit
            )))
        }
    }
}
