//! Deadline-aware, cancellable execution scope passed down from the entry points.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::domain::errors::DomainError;

#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl Context {
    /// A root scope with no deadline that is never cancelled unless [`Context::cancel`] is called.
    pub fn background() -> Self {
        Self {
            deadline: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Derives a child whose deadline is the earlier of the parent's and `now + timeout`.
    ///
    /// A timeout too large to represent as an instant adds no deadline of its own.
    /// Cancelling the parent cancels the child; cancelling the child leaves the parent alone.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = match (self.deadline, Instant::now().checked_add(timeout)) {
            (Some(parent), Some(candidate)) => Some(parent.min(candidate)),
            (parent, candidate) => parent.or(candidate),
        };

        Self {
            deadline,
            cancellation: self.cancellation.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Why this scope is finished, if it is.
    pub fn err(&self) -> Option<DomainError> {
        if self.cancellation.is_cancelled() {
            return Some(DomainError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(DomainError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Drives `operation` until it completes, the deadline passes or the scope is cancelled.
    ///
    /// A scope that is already finished never polls `operation`.
    pub async fn run<T, F>(&self, operation: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(DomainError::Cancelled),
            _ = expired => Err(DomainError::DeadlineExceeded),
            result = operation => result,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
