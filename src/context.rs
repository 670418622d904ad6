//! Per-call cancellation and deadlines.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::LedgerSqlError;

/// Cancellation scope passed to every connection call.
///
/// Cloning shares the token; [`CallContext::child`] derives a scope that is
/// canceled with its parent but can also be canceled on its own.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that is never canceled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Same token, deadline `timeout` from now (or the existing deadline if sooner).
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Self {
            token: self.token.clone(),
            deadline: Some(deadline),
        }
    }

    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails fast if the context is already done.
    ///
    /// # Errors
    /// Returns `Canceled` or `DeadlineExceeded`.
    pub fn check(&self) -> Result<(), LedgerSqlError> {
        if self.token.is_cancelled() {
            return Err(LedgerSqlError::Canceled);
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(LedgerSqlError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` until it finishes or the context is canceled or expires.
    ///
    /// A future abandoned this way is dropped at its current await point.
    ///
    /// # Errors
    /// Returns `Canceled`, `DeadlineExceeded`, or whatever `fut` returns.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, LedgerSqlError>
    where
        F: Future<Output = Result<T, LedgerSqlError>>,
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
            () = self.token.cancelled() => Err(LedgerSqlError::Canceled),
            () = deadline => Err(LedgerSqlError::DeadlineExceeded),
            res = fut => res,
        }
    }
}
