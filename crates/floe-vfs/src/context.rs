//! Per-operation cancellation and deadline.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{VfsError, VfsResult};

/// Cancellation and deadline for one filesystem operation.
///
/// Cheap to clone. Every remote call a backend makes on behalf of an
/// operation is raced against both the token and the deadline.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    /// A context that never cancels and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context tied to an existing cancellation token.
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    /// Set an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// The cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context and every clone of it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Fail fast if the context already fired.
    pub fn check(&self) -> VfsResult<()> {
        if self.cancel.is_cancelled() {
            return Err(VfsError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(VfsError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run `fut` unless the context is cancelled or its deadline passes first.
    pub async fn run<F, T>(&self, fut: F) -> VfsResult<T>
    where
        F: Future<Output = VfsResult<T>>,
    {
        self.check()?;
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(VfsError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => Err(VfsError::DeadlineExceeded),
                result = fut => result,
            },
            None => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(VfsError::Cancelled),
                result = fut => result,
            },
        }
    }
}
