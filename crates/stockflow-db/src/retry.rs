//! # Lock-Conflict Retry
//!
//! SQLite allows one writer at a time. Writers wait up to the pool's busy
//! timeout; a conflict that outlives it surfaces as
//! [`DbError::ConcurrencyConflict`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  attempt 1: BEGIN … UPDATE products … ✗ SQLITE_BUSY → rollback         │
//! │             sleep 20ms                                                  │
//! │  attempt 2: BEGIN … UPDATE products … ✗ SQLITE_BUSY → rollback         │
//! │             sleep 40ms                                                  │
//! │  attempt 3: BEGIN … UPDATE products … COMMIT ✓                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A statement cannot be retried inside a transaction that already failed,
//! so the retry unit is the whole transaction.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::DbResult;

/// Bounded exponential backoff for lock conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. 0 disables retry.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 5,
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Sleep before retry number `retry` (1-based): initial × 2^(retry-1),
    /// capped at `max_backoff`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Runs `attempt` until it succeeds, fails with a non-conflict error, or the
/// policy's retries run out.
///
/// `attempt` must open and commit its own transaction each call.
pub async fn with_conflict_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut retry = 0;
    loop {
        match attempt().await {
            Err(err) if err.is_conflict() && retry < policy.max_retries => {
                retry += 1;
                let backoff = policy.backoff_for(retry);
                warn!(
                    operation,
                    retry,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Lock conflict, retrying transaction"
                );
                tokio::time::sleep(backoff).await;
            }
            result => return result,
        }
    }
}
