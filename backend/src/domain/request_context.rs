//! Per-request cancellation, deadline and correlation.
//!
//! Every engine operation receives a [`RequestContext`]. The unit of work
//! stores a clone in the transaction it opens, so each repository call,
//! lock wait and commit made on behalf of the request observes the same
//! cancellation token and deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Why a guarded call was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// The cancellation token fired.
    #[error("request was cancelled")]
    Cancelled,
    /// The deadline elapsed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation-bearing request context.
///
/// Cloning is cheap and clones share the same token.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use backend::domain::RequestContext;
///
/// let ctx = RequestContext::new().with_timeout(Duration::from_secs(5));
/// assert!(!ctx.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
    correlation_id: Uuid,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Context with a fresh token, no deadline and a random correlation id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            deadline: None,
            correlation_id: Uuid::new_v4(),
        }
    }

    /// Context driven by an existing token, e.g. one owned by a server loop.
    #[must_use]
    pub fn with_token(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            ..Self::new()
        }
    }

    /// Set an absolute deadline, keeping the earlier one if already set.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Set a deadline relative to now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Override the correlation id used in log fields.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    #[must_use]
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Token observed by guarded calls; cancel it to abort the request.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Fire the cancellation token.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Whether the token fired or the deadline passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.check().is_err()
    }

    /// Fail fast if the request is no longer live.
    pub fn check(&self) -> Result<(), ContextError> {
        if self.cancellation.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(ContextError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the request is cancelled first.
    ///
    /// The future is dropped on cancellation; callers own the cleanup of
    /// whatever it was doing.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ContextError>
    where
        F: Future,
    {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(ContextError::Cancelled),
            () = deadline => Err(ContextError::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn run_returns_output_when_live() {
        let ctx = RequestContext::new();
        let value = ctx.run(async { 7 }).await.expect("live context");
        assert_eq!(value, 7);
    }

    #[rstest]
    #[tokio::test]
    async fn run_fails_fast_after_cancel() {
        let ctx = RequestContext::new();
        ctx.cancel();
        assert_eq!(ctx.run(async { 1 }).await, Err(ContextError::Cancelled));
        assert!(ctx.is_cancelled());
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn run_honours_deadline() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(50));
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(10)))
            .await;
        assert_eq!(result, Err(ContextError::DeadlineExceeded));
    }

    #[rstest]
    #[tokio::test]
    async fn clones_share_cancellation() {
        let ctx = RequestContext::new();
        let clone = ctx.clone();
        let waiter = tokio::spawn(async move { clone.run(std::future::pending::<()>()).await });
        ctx.cancel();
        let result = waiter.await.expect("task joins");
        assert_eq!(result, Err(ContextError::Cancelled));
    }

    #[rstest]
    fn with_deadline_keeps_the_earlier_deadline() {
        let now = Instant::now();
        let early = now + Duration::from_secs(1);
        let late = now + Duration::from_secs(10);
        let ctx = RequestContext::new().with_deadline(early).with_deadline(late);
        assert_eq!(ctx.deadline(), Some(early));
    }
}
