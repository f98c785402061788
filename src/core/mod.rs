//! Engine core: sequencing, keyed stage tables and the dispatcher.
//!
//! The public API from this module is [`Debouncer`] (with its builder and
//! [`RunHandle`]) plus the invocation data model.
//!
//! Internal modules:
//! - [`sequencer`]: assigns monotonic engine-clock sequences;
//! - [`debounce`]: per-key pending invocation with its timer;
//! - [`dispatched`]: last dispatched sequence per key, the quiet-period anchor;
//! - [`initializing`]: per-key start in progress, start verdicts;
//! - [`active`]: per-key awaited operation and its cancel handle;
//! - [`admission`]: pure sequence comparisons deciding eligibility;
//! - [`view`]: aggregate loading observables;
//! - [`dispatcher`]: the single task applying every transition.

mod active;
mod admission;
mod builder;
mod debounce;
mod debouncer;
mod dispatched;
mod dispatcher;
mod initializing;
mod invocation;
mod sequencer;
mod view;

pub use builder::DebouncerBuilder;
pub use debouncer::{Debouncer, RunHandle};
pub use invocation::{Delivery, Failure, FailureStage, Invocation, Key, Sequence};
