//! # Invocation data model.
//!
//! - [`Key`] identifies a logical thread: invocations sharing a key are
//!   mutually exclusive and ordered by [`Sequence`].
//! - [`Invocation`] is what callers submit through `run`.
//! - [`Delivery`] / [`Failure`] are the one-shot outcomes emitted to callers.

use std::fmt;
use std::sync::Arc;

use crate::error::OperationError;

/// Identifier for a set of mutually exclusive invocations.
///
/// Cheap to clone; ordered so loading sets are deterministic.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Arc<str>);

impl Key {
    /// Creates a key from any string-like value.
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Key {
    /// The constant key used when callers have a single logical thread.
    fn default() -> Self {
        Self::new("default")
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Arc<str>> for Key {
    fn from(value: Arc<str>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Ordering value of an invocation: milliseconds on the engine clock.
///
/// A higher sequence for the same key always supersedes a lower one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sequence(u64);

impl Sequence {
    /// Wraps a raw value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns `self + window`, saturating.
    #[inline]
    pub(crate) fn plus(self, window: u64) -> Sequence {
        Sequence(self.0.saturating_add(window))
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A request to run the operation.
///
/// `key` defaults to [`Key::default`]; `time` defaults to "now" on the engine
/// clock (see [`Debouncer::now`](crate::Debouncer::now)).
///
/// # Example
/// ```
/// use supersede::{Invocation, Key};
///
/// let inv = Invocation::new(3_u32).with_key("card-7").with_time(1_000);
/// assert_eq!(inv.key, Some(Key::from("card-7")));
/// assert_eq!(inv.time, Some(1_000));
/// ```
#[derive(Clone, Debug)]
pub struct Invocation<P> {
    /// Logical thread of the invocation.
    pub key: Option<Key>,
    /// Explicit sequence (engine-clock milliseconds).
    pub time: Option<u64>,
    /// Data passed to the operation's start routine.
    pub payload: P,
}

impl<P> Invocation<P> {
    /// Creates an invocation for the default key at the current time.
    pub fn new(payload: P) -> Self {
        Self {
            key: None,
            time: None,
            payload,
        }
    }

    /// Sets the key.
    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets an explicit sequence value.
    pub fn with_time(mut self, time: u64) -> Self {
        self.time = Some(time);
        self
    }
}

impl<P: Default> Default for Invocation<P> {
    fn default() -> Self {
        Self::new(P::default())
    }
}

/// An invocation after sequencing.
#[derive(Debug)]
pub(crate) struct Registered<P> {
    pub key: Key,
    pub sequence: Sequence,
    pub payload: P,
}

/// Accepted result of the invocation that still owns its key.
#[derive(Debug)]
pub struct Delivery<D> {
    /// Key of the invocation.
    pub key: Key,
    /// Sequence of the invocation.
    pub sequence: Sequence,
    /// Result data (shared between receivers).
    pub data: Arc<D>,
}

impl<D> Clone for Delivery<D> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            sequence: self.sequence,
            data: Arc::clone(&self.data),
        }
    }
}

/// Stage at which an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// The start routine failed; the operation never became active.
    Start,
    /// The result future failed.
    Settle,
}

/// Error surfaced once for the invocation that still owns its key.
#[derive(Debug, Clone)]
pub struct Failure {
    /// Key of the invocation.
    pub key: Key,
    /// Sequence of the invocation.
    pub sequence: Sequence,
    /// Where the failure happened.
    pub stage: FailureStage,
    /// The error.
    pub error: Arc<OperationError>,
}
