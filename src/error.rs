//! Error types used by the engine and by wrapped operations.
//!
//! This module defines two error enums:
//!
//! - [`OperationError`]: errors raised by the wrapped asynchronous operation,
//!   either while starting or while settling.
//! - [`RunError`]: errors raised when submitting an invocation to the engine.
//!
//! Both types provide `as_label` for logs/metrics.

use thiserror::Error;

/// # Errors produced by a wrapped operation.
///
/// Surfaced once on [`Debouncer::failures`](crate::Debouncer::failures) for the
/// invocation that still owns its key. Never retried.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// The operation failed (start routine or result future).
    #[error("operation failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The operation observed its own cancellation and gave up.
    #[error("operation cancelled")]
    Canceled,

    /// The start routine or result future panicked.
    #[error("operation panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl OperationError {
    /// Shorthand for [`OperationError::Fail`].
    ///
    /// # Example
    /// ```
    /// use supersede::OperationError;
    ///
    /// let err = OperationError::fail("http 503");
    /// assert_eq!(err.to_string(), "operation failed: http 503");
    /// ```
    pub fn fail(error: impl Into<String>) -> Self {
        OperationError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use supersede::OperationError;
    ///
    /// assert_eq!(OperationError::Canceled.as_label(), "operation_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            OperationError::Fail { .. } => "operation_failed",
            OperationError::Canceled => "operation_canceled",
            OperationError::Panicked { .. } => "operation_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            OperationError::Fail { error } => format!("error: {error}"),
            OperationError::Canceled => "cancelled".to_string(),
            OperationError::Panicked { info } => format!("panic: {info}"),
        }
    }

    pub(crate) fn panicked(payload: Box<dyn std::any::Any + Send>) -> Self {
        OperationError::Panicked {
            info: panic_message(payload.as_ref()),
        }
    }
}

/// Error returned by [`Debouncer::run`](crate::Debouncer::run).
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunError {
    /// The engine was shut down (or dropped) and accepts no more invocations.
    #[error("engine closed")]
    Closed,
}

impl RunError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RunError::Closed => "run_closed",
        }
    }
}

/// Renders a panic payload the way `std` does for `&str`/`String` payloads.
pub(crate) fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
