//! # Initialization stage.
//!
//! Tracks, per key, the invocation currently running the operation's start
//! routine. When a start resolves, [`InitializingTable::resolve`] classifies it:
//!
//! ```text
//! Idle ──► Initializing ──► start Err         → Errored (entry cleared if still ours)
//!                       ──► start Ok, newer
//!                           entered meanwhile → Dead    (cancel, newer entry untouched)
//!                       ──► start Ok, newer
//!                           active            → Old     (cancel)
//!                       ──► start Ok          → Current (forward to Active stage)
//! ```

use std::collections::HashMap;

use crate::core::admission::is_newer;
use crate::core::invocation::{Key, Sequence};

/// Outcome of a successful start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartVerdict {
    /// A newer invocation entered initialization while this one was starting.
    Dead,
    /// A newer invocation is already active.
    Old,
    /// Still the owner: move to the Active stage.
    Current,
}

/// Starts in flight for one key.
///
/// `latest` survives until every start for the key resolved, so a slow older
/// start still sees that a newer one was accepted even after the newer one
/// has settled.
#[derive(Debug, Clone, Copy)]
struct Starting {
    latest: Sequence,
    pending: usize,
}

pub(crate) struct InitializingTable {
    entries: HashMap<Key, Starting>,
}

impl InitializingTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Newest sequence that entered initialization for `key`.
    pub(crate) fn sequence_of(&self, key: &Key) -> Option<Sequence> {
        self.entries.get(key).map(|s| s.latest)
    }

    /// Records `sequence` as initializing unless something newer already is.
    pub(crate) fn enter(&mut self, key: &Key, sequence: Sequence) -> bool {
        if is_newer(self.sequence_of(key), sequence) {
            return false;
        }
        let entry = self.entries.entry(key.clone()).or_insert(Starting {
            latest: sequence,
            pending: 0,
        });
        entry.latest = sequence;
        entry.pending += 1;
        true
    }

    /// Accounts for a resolved start; returns whether `sequence` still owned the key.
    pub(crate) fn finish(&mut self, key: &Key, sequence: Sequence) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        let owned = entry.latest == sequence;
        entry.pending = entry.pending.saturating_sub(1);
        if entry.pending == 0 {
            self.entries.remove(key);
        }
        owned
    }

    /// Classifies a successful start and accounts for it.
    pub(crate) fn resolve(
        &mut self,
        key: &Key,
        sequence: Sequence,
        active: Option<Sequence>,
    ) -> StartVerdict {
        if !self.finish(key, sequence) {
            return StartVerdict::Dead;
        }
        if is_newer(active, sequence) {
            StartVerdict::Old
        } else {
            StartVerdict::Current
        }
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.keys()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
