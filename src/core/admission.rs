//! # Admission gate.
//!
//! Pure decisions comparing a candidate sequence against what the
//! Initializing and Active tables hold for the same key. The debounce test
//! also looks at the last dispatched sequence, which outlives both tables
//! when the operation settles inside the window.
//!
//! ```text
//! first pass   ─► bypasses_debounce: every holder satisfies holder + window <= candidate
//!                   yes → Initialization      no → Debounce stage
//! second pass  ─► admits: no holder is strictly newer than the candidate
//!                   yes → Initialization      no → dropped (superseded)
//! ```
//!
//! The window edge itself is eligible: `holder + window == candidate` dispatches.

use crate::core::invocation::Sequence;

/// First pass, on submission.
pub(crate) fn bypasses_debounce(
    candidate: Sequence,
    window: u64,
    initializing: Option<Sequence>,
    active: Option<Sequence>,
    dispatched: Option<Sequence>,
) -> bool {
    let elapsed = |holder: Option<Sequence>| holder.map_or(true, |h| h.plus(window) <= candidate);
    elapsed(initializing) && elapsed(active) && elapsed(dispatched)
}

/// Second pass, when the quiet period ends.
pub(crate) fn admits(
    candidate: Sequence,
    initializing: Option<Sequence>,
    active: Option<Sequence>,
) -> bool {
    !is_newer(initializing, candidate) && !is_newer(active, candidate)
}

/// True if `holder` exists and strictly supersedes `candidate`.
#[inline]
pub(crate) fn is_newer(holder: Option<Sequence>, candidate: Sequence) -> bool {
    holder.is_some_and(|h| h > candidate)
}
