//! # Operation abstractions.
//!
//! - [`Operation`] - trait for the wrapped, startable asynchronous operation
//! - [`OperationFn`] - closure-backed implementation
//! - [`OperationRef`] - shared reference (`Arc<dyn Operation>`)
//! - [`Started`] / [`CancelHandle`] - what a start returns

#[allow(clippy::module_inception)]
mod operation;
mod operation_fn;
mod started;

pub use operation::{BoxStartFuture, Operation, OperationRef};
pub use operation_fn::OperationFn;
pub use started::{BoxResultFuture, CancelHandle, Started};
