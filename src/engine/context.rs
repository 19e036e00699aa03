use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context stopped a pending operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("generic_timeout_error")]
    DeadlineExceeded,

    #[error("interrupted")]
    Cancelled,
}

/// Cancellable, deadline-bearing context threaded through an evaluation.
///
/// Children derived with [`Context::with_timeout`] are cancelled with their
/// parent and never outlive the parent's deadline.
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A context with no deadline.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A context cancelled through `token`.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// A child context expiring after `timeout` or at the parent deadline,
    /// whichever comes first.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels this context and every child.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drives `fut` until it completes, the context is cancelled, or the
    /// deadline expires.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ContextError>
    where
        F: Future,
    {
        if self.token.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    out = fut => Ok(out),
                    () = self.token.cancelled() => Err(ContextError::Cancelled),
                    () = tokio::time::sleep_until(deadline) => Err(ContextError::DeadlineExceeded),
                }
            }
            None => {
                tokio::select! {
                    out = fut => Ok(out),
                    () = self.token.cancelled() => Err(ContextError::Cancelled),
                }
            }
        }
    }
}
