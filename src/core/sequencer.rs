//! # Sequencer: the sole source of ordering truth.
//!
//! Assigns each invocation a [`Sequence`]: milliseconds elapsed on the engine
//! clock, bumped by one when two invocations land in the same millisecond so
//! auto-assigned values are strictly increasing. Explicit caller times are
//! taken verbatim and raise the floor for later auto-assigned values.
//!
//! The clock is `tokio::time::Instant`, so paused test time drives it too.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time::Instant;

use crate::core::invocation::Sequence;

pub(crate) struct Sequencer {
    origin: Instant,
    last: AtomicU64,
}

impl Sequencer {
    pub(crate) fn new() -> Self {
        Self {
            origin: Instant::now(),
            last: AtomicU64::new(0),
        }
    }

    /// Milliseconds since the engine was built.
    pub(crate) fn now(&self) -> u64 {
        self.origin.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
    }

    pub(crate) fn next(&self, time: Option<u64>) -> Sequence {
        if let Some(t) = time {
            self.last.fetch_max(t, Ordering::AcqRel);
            return Sequence::new(t);
        }

        let now = self.now();
        let bump = |last: u64| now.max(last.saturating_add(1));
        let prev = match self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(bump(last)))
        {
            Ok(prev) | Err(prev) => prev,
        };
        Sequence::new(bump(prev))
    }
}
