//! Retry logic for transient database errors.
//!
//! Background workers that own their own connection (dedup cleanup, the
//! expired-message sweeper, federation retry loop) retry transient errors
//! with exponential backoff. Request-scoped queries do NOT retry here —
//! a transient failure during a request is surfaced to the client instead,
//! since retrying inside a request risks double-processing a client retry.

use std::future::Future;
use std::time::Duration;

const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 100;
const MAX_DELAY_MS: u64 = 2000;
const BACKOFF_FACTOR: f64 = 2.0;

/// True if `err` looks like a transient connection/lock failure rather than
/// a constraint violation or programming error.
pub fn is_transient_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db_err) => {
            let msg = db_err.message().to_lowercase();
            [
                "connection refused",
                "connection reset",
                "connection lost",
                "deadlock",
                "database is locked",
                "timeout",
                "server closed",
                "broken pipe",
            ]
            .iter()
            .any(|p| msg.contains(p))
        }
        _ => false,
    }
}

/// Retry `op` with exponential backoff on transient errors. Non-transient
/// errors propagate immediately.
pub async fn with_retry<T, F, Fut>(op_name: &str, mut op: F) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient_error(&err) && attempt < MAX_RETRIES => {
                let delay_ms =
                    ((BASE_DELAY_MS as f64) * BACKOFF_FACTOR.powi(attempt as i32)) as u64;
                let delay_ms = delay_ms.min(MAX_DELAY_MS);
                tracing::warn!(
                    operation = op_name,
                    attempt = attempt + 1,
                    delay_ms,
                    error = %err,
                    "transient database error, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
            Err(err) => {
                if attempt > 0 {
                    tracing::error!(
                        operation = op_name,
                        attempts = attempt + 1,
                        error = %err,
                        "transient database error exhausted retries"
                    );
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let result: Result<i32, sqlx::Error> = with_retry("noop", || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let attempts = AtomicU32::new(0);
        let result: Result<i32, sqlx::Error> = with_retry("flaky", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(sqlx::Error::PoolTimedOut)
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_transient_errors() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let attempts = AtomicU32::new(0);
        let result: Result<i32, sqlx::Error> = with_retry("bad-query", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(sqlx::Error::RowNotFound) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
