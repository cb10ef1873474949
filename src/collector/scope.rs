use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Why work bounded by a [`TargetScope`] did not finish.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled")]
    Cancelled,

    #[error("blocking call did not complete: {0}")]
    WorkerLost(String),
}

/// The deadline and cancellation token for one target.
///
/// The token is a child of the run's token, so cancelling the run cancels
/// every open scope. Dropping the scope cancels its token, which stops
/// anything still bound to it as soon as the target is done.
pub struct TargetScope {
    deadline: Instant,
    token: CancellationToken,
    _guard: DropGuard,
}

impl TargetScope {
    pub fn new(parent: &CancellationToken, timeout: Duration) -> Self {
        let token = parent.child_token();
        let guard = token.clone().drop_guard();
        Self {
            deadline: Instant::now() + timeout,
            token,
            _guard: guard,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Checks the scope before starting new work.
    pub fn check(&self) -> Result<(), ScopeError> {
        if self.is_cancelled() {
            Err(ScopeError::Cancelled)
        } else if self.is_expired() {
            Err(ScopeError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    /// Runs `fut` until it completes, the deadline passes or the scope is
    /// cancelled, whichever comes first.
    pub async fn bound<F>(&self, fut: F) -> Result<F::Output, ScopeError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ScopeError::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(ScopeError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }

    /// Runs a blocking call on tokio's blocking pool, bounded like [`bound`].
    ///
    /// `call` receives the time left in the scope and must not block for
    /// longer than that, since an abandoned call keeps its thread until it
    /// returns on its own.
    ///
    /// [`bound`]: TargetScope::bound
    pub async fn blocking<T, F>(&self, call: F) -> Result<T, ScopeError>
    where
        F: FnOnce(Duration) -> T + Send + 'static,
        T: Send + 'static,
    {
        self.check()?;
        let remaining = self.remaining();
        let handle = tokio::task::spawn_blocking(move || call(remaining));

        match self.bound(handle).await? {
            Ok(out) => Ok(out),
            Err(e) => Err(ScopeError::WorkerLost(e.to_string())),
        }
    }
}
