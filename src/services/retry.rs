use crate::utils::error::{AppError, AppResult};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Bounded retry for booking transactions.
///
/// Only [`AppError::WriteConflict`] is retried. Once `max_attempts` is used up
/// the caller gets [`AppError::TransactionAborted`].
///
/// `attempt_timeout` bounds the uncommitted part of an attempt through
/// [`RetryPolicy::within`]. Commit is never raced against the clock: once a
/// commit has been sent the attempt is not re-run unless the store rejected it.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            attempt_timeout: Duration::from_millis(5000),
            base_backoff: Duration::from_millis(20),
        }
    }
}

impl RetryPolicy {
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> AppResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt_no = 0;
        loop {
            attempt_no += 1;

            match attempt(attempt_no).await {
                Err(AppError::WriteConflict(reason)) if attempt_no < self.max_attempts => {
                    let delay = self.backoff(attempt_no);
                    tracing::warn!(operation, attempt = attempt_no, %reason, ?delay, "retrying transaction");
                    tokio::time::sleep(delay).await;
                }
                Err(AppError::WriteConflict(reason)) => {
                    tracing::error!(operation, attempts = attempt_no, %reason, "transaction retries exhausted");
                    return Err(AppError::TransactionAborted(format!(
                        "{} failed after {} attempts: {}",
                        operation, attempt_no, reason
                    )));
                }
                other => return other,
            }
        }
    }

    /// Deadline for the uncommitted steps of an attempt starting now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.attempt_timeout
    }

    /// Run one uncommitted step under `deadline`. Running out of time is a
    /// retryable conflict; the dropped step rolls back with its transaction.
    pub async fn within<T, Fut>(&self, deadline: Instant, step: Fut) -> AppResult<T>
    where
        Fut: Future<Output = AppResult<T>>,
    {
        match tokio::time::timeout_at(deadline, step).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AppError::WriteConflict(format!(
                "attempt exceeded {:?}",
                self.attempt_timeout
            ))),
        }
    }

    // exponential with up to one base step of jitter
    fn backoff(&self, attempt_no: u32) -> Duration {
        let base = self.base_backoff.as_millis() as u64;
        let exponential = base.saturating_mul(1u64 << attempt_no.saturating_sub(1).min(16));
        let jitter = if base == 0 { 0 } else { rand::thread_rng().gen_range(0..=base) };
        Duration::from_millis(exponential + jitter)
    }
}
