//! # Handle returned by a started operation.
//!
//! [`Started`] bundles the eventual result of an operation with an optional
//! [`CancelHandle`]. The engine awaits the result at most once and invokes the
//! cancel handle when the operation is superseded, dead or shut down.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::OperationError;

/// Boxed result future of a started operation.
pub type BoxResultFuture<D> = Pin<Box<dyn Future<Output = Result<D, OperationError>> + Send + 'static>>;

/// Cooperative, best-effort cancellation capability supplied by an operation.
///
/// Implementations must tolerate being called after the operation settled and
/// being called more than once.
#[derive(Clone)]
pub struct CancelHandle(Arc<dyn Fn() + Send + Sync>);

impl CancelHandle {
    /// Wraps a cancellation callback.
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invokes the callback.
    pub fn cancel(&self) {
        (self.0)()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CancelHandle")
    }
}

/// A started operation: optional cancel handle plus the pending result.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use supersede::Started;
///
/// let token = CancellationToken::new();
/// let started: Started<u32> = Started::new(async { Ok(31) }).with_token(token.clone());
/// assert!(started.is_cancellable());
/// ```
pub struct Started<D> {
    cancel: Option<CancelHandle>,
    result: BoxResultFuture<D>,
}

impl<D> Started<D> {
    /// Wraps the pending result of an operation with no cancel capability.
    pub fn new<F>(result: F) -> Self
    where
        F: Future<Output = Result<D, OperationError>> + Send + 'static,
    {
        Self {
            cancel: None,
            result: Box::pin(result),
        }
    }

    /// An operation whose result is already known.
    pub fn ready(data: D) -> Self
    where
        D: Send + 'static,
    {
        Self::new(std::future::ready(Ok(data)))
    }

    /// Attaches a cancellation callback.
    pub fn with_cancel(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.cancel = Some(CancelHandle::new(f));
        self
    }

    /// Attaches a [`CancellationToken`]; cancelling the operation cancels the token.
    pub fn with_token(self, token: CancellationToken) -> Self {
        self.with_cancel(move || token.cancel())
    }

    /// Returns true if a cancel handle is attached.
    pub fn is_cancellable(&self) -> bool {
        self.cancel.is_some()
    }

    /// Cancels the operation (if it can be cancelled) and drops its result.
    pub(crate) fn cancel(self) {
        if let Some(cancel) = self.cancel {
            cancel.cancel();
        }
    }

    pub(crate) fn into_parts(self) -> (Option<CancelHandle>, BoxResultFuture<D>) {
        (self.cancel, self.result)
    }
}

impl<D> fmt::Debug for Started<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Started")
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}
