/// Per-request execution context
///
/// Carries the request id used in logs and a cancellation signal. Every
/// service operation runs its body through [`RequestContext::run`]: when the
/// token is cancelled or the deadline passes, the body future is dropped
/// together with any open store transaction, so nothing it wrote becomes
/// visible.
///
/// # Example
///
/// ```
/// use agenteur_shared::context::RequestContext;
/// use agenteur_shared::error::CoreError;
///
/// # async fn example() {
/// let ctx = RequestContext::new("req-1");
/// ctx.cancel();
///
/// let result: Result<(), CoreError> = ctx.run(async { Ok(()) }).await;
/// assert!(matches!(result, Err(CoreError::Cancelled)));
/// # }
/// ```

use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::CoreError;

/// Request id, cancellation token and optional deadline
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Creates a context with no deadline
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Creates a context with a generated request id
    pub fn detached() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Uses an externally owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Fails operations still running `timeout` from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancels every operation running under this context
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Runs `fut` unless cancelled first
    ///
    /// Cancellation is checked before the body is polled, so an already
    /// cancelled context never starts work.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, CoreError>
    where
        F: Future<Output = Result<T, CoreError>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(request_id = %self.request_id, "Operation cancelled");
                Err(CoreError::Cancelled)
            }
            _ = deadline => {
                debug!(request_id = %self.request_id, "Operation deadline elapsed");
                Err(CoreError::Cancelled)
            }
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = RequestContext::new("req-1");
        let result = ctx.run(async { Ok::<_, CoreError>(42) }).await;
        assert_eq!(result.expect("Should complete"), 42);
        assert_eq!(ctx.request_id(), "req-1");
    }

    #[tokio::test]
    async fn test_run_cancelled_before_start() {
        let ctx = RequestContext::detached();
        ctx.cancel();
        assert!(ctx.is_cancelled());

        let result = ctx.run(async { Ok::<_, CoreError>(()) }).await;
        assert!(matches!(result, Err(CoreError::Cancelled)));
    }

    #[tokio::test]
    async fn test_run_cancelled_midway() {
        let token = CancellationToken::new();
        let ctx = RequestContext::detached().with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, CoreError>(())
            })
            .await;

        canceller.await.expect("Canceller should finish");
        assert!(matches!(result, Err(CoreError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_deadline() {
        let ctx = RequestContext::detached().with_timeout(Duration::from_millis(50));

        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, CoreError>(())
            })
            .await;

        assert!(matches!(result, Err(CoreError::Cancelled)));
    }

    #[tokio::test]
    async fn test_business_errors_pass_through() {
        let ctx = RequestContext::detached();
        let result: Result<(), CoreError> = ctx.run(async { Err(CoreError::EmailExists) }).await;
        assert!(matches!(result, Err(CoreError::EmailExists)));
    }
}
