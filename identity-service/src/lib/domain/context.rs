use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// Error returned when a request outlives its deadline.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Request deadline exceeded")]
pub struct DeadlineExceeded;

/// Per-request execution context.
///
/// Carries the caller's deadline through every store call. A context without
/// a deadline never times out; dropping the surrounding future still cancels
/// the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context without a deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .map_or(false, |deadline| Instant::now() >= deadline)
    }

    /// Drive `future` to completion unless the deadline passes first.
    ///
    /// An already elapsed deadline fails without polling `future`.
    ///
    /// # Errors
    /// * `DeadlineExceeded` - Deadline elapsed before or while running
    pub async fn run<F, T>(&self, future: F) -> Result<T, DeadlineExceeded>
    where
        F: Future<Output = T>,
    {
        match self.deadline {
            None => Ok(future.await),
            Some(_) if self.is_expired() => Err(DeadlineExceeded),
            Some(deadline) => tokio::time::timeout_at(deadline, future)
                .await
                .map_err(|_| DeadlineExceeded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_never_expires() {
        let ctx = RequestContext::background();
        assert!(!ctx.is_expired());
        assert_eq!(ctx.run(async { 42 }).await, Ok(42));
    }

    #[tokio::test]
    async fn test_elapsed_deadline_skips_future() {
        let ctx = RequestContext::with_timeout(Duration::ZERO);
        let mut polled = false;

        let result = ctx
            .run(async {
                polled = true;
            })
            .await;

        assert_eq!(result, Err(DeadlineExceeded));
        assert!(!polled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_slow_future() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(50));

        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;

        assert_eq!(result, Err(DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_future_completes_before_deadline() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(5));

        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                "done"
            })
            .await;

        assert_eq!(result, Ok("done"));
    }
}
