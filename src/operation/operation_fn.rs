//! # Function-backed operation (`OperationFn`)
//!
//! [`OperationFn`] wraps a closure `F: Fn(P) -> Fut`, producing a fresh future
//! per start. No hidden mutation between starts; shared state goes behind an
//! explicit `Arc<...>` captured by the closure.
//!
//! ## Example
//! ```rust
//! use supersede::{OperationError, OperationFn, OperationRef, Started};
//!
//! let op: OperationRef<u32, String> = OperationFn::arc(|page: u32| async move {
//!     Ok::<_, OperationError>(Started::ready(format!("page {page}")))
//! });
//! # let _ = op;
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::error::OperationError;
use crate::operation::operation::{BoxStartFuture, Operation};
use crate::operation::started::Started;

/// Function-backed operation implementation.
#[derive(Debug)]
pub struct OperationFn<F> {
    f: F,
}

impl<F> OperationFn<F> {
    /// Creates a new function-backed operation.
    ///
    /// Prefer [`OperationFn::arc`] when you immediately need an [`OperationRef`](crate::OperationRef).
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the operation and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F, Fut, P, D> Operation<P, D> for OperationFn<F>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Started<D>, OperationError>> + Send + 'static,
{
    fn start(&self, payload: P) -> BoxStartFuture<D> {
        Box::pin((self.f)(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OperationRef;

    #[tokio::test]
    async fn each_start_builds_a_fresh_future() {
        let op: OperationRef<u32, u32> =
            OperationFn::arc(|n: u32| async move { Ok::<_, OperationError>(Started::ready(n * 2)) });

        let (_, first) = op.start(2).await.unwrap().into_parts();
        let (_, second) = op.start(5).await.unwrap().into_parts();
        assert_eq!(first.await, Ok(4));
        assert_eq!(second.await, Ok(10));
    }

    #[tokio::test]
    async fn start_errors_pass_through() {
        let op: OperationRef<(), ()> =
            OperationFn::arc(|_: ()| async { Err::<Started<()>, _>(OperationError::fail("offline")) });
        let err = op.start(()).await.unwrap_err();
        assert_eq!(err, OperationError::fail("offline"));
    }
}
