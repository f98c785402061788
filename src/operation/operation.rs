//! # Wrapped asynchronous operation.
//!
//! The [`Operation`] trait is the external collaborator driven by the engine:
//! given a payload it starts the work (synchronously or asynchronously) and
//! returns a [`Started`] handle carrying the eventual result and an optional
//! cancel capability. [`OperationRef`] is the shared `Arc<dyn Operation>` form.
//!
//! The start routine should return as soon as the work is dispatched (e.g. the
//! request is sent); waiting for the response belongs in the result future.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::OperationError;
use crate::operation::started::Started;

/// Boxed future produced by [`Operation::start`].
pub type BoxStartFuture<D> =
    Pin<Box<dyn Future<Output = Result<Started<D>, OperationError>> + Send + 'static>>;

/// Shared handle to an operation.
pub type OperationRef<P, D> = Arc<dyn Operation<P, D>>;

/// # Startable, cancellable asynchronous operation.
///
/// # Example
/// ```
/// use supersede::{BoxStartFuture, Operation, Started};
///
/// struct AddToCart;
///
/// impl Operation<u32, u32> for AddToCart {
///     fn start(&self, qty: u32) -> BoxStartFuture<u32> {
///         Box::pin(async move { Ok(Started::ready(qty + 1)) })
///     }
/// }
/// ```
pub trait Operation<P, D>: Send + Sync + 'static {
    /// Starts the operation for `payload`.
    ///
    /// Called on the dispatcher; must not block. Each call returns a fresh future.
    fn start(&self, payload: P) -> BoxStartFuture<D>;
}
