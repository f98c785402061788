//! # Debounce stage: at most one pending invocation per key.
//!
//! ```text
//! submit(entry) ──► replaces the pending entry for entry.key (its timer token is cancelled)
//! timer fires   ──► take_if(key, seq) ──► admission gate (second pass)
//! force_remove  ──► cancels the timer, drops the entry without emitting
//! ```
//!
//! Superseded payloads are dropped eagerly, so memory is bounded by the number
//! of distinct keys.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::core::invocation::{Key, Registered, Sequence};

pub(crate) struct DebouncedEntry<P> {
    pub sequence: Sequence,
    pub payload: P,
    /// Cancels the pending quiet-period timer.
    pub timer: CancellationToken,
}

pub(crate) struct DebounceTable<P> {
    entries: HashMap<Key, DebouncedEntry<P>>,
}

impl<P> DebounceTable<P> {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub(crate) fn sequence_of(&self, key: &Key) -> Option<Sequence> {
        self.entries.get(key).map(|e| e.sequence)
    }

    /// Stores `entry`, returning the replaced one (whose timer is already cancelled).
    pub(crate) fn submit(&mut self, key: Key, entry: DebouncedEntry<P>) -> Option<DebouncedEntry<P>> {
        let prev = self.entries.insert(key, entry);
        if let Some(prev) = &prev {
            prev.timer.cancel();
        }
        prev
    }

    /// Removes the entry for `key` if it still holds `sequence`.
    ///
    /// A timer racing with a replacement finds a different sequence and gets nothing.
    pub(crate) fn take_if(&mut self, key: &Key, sequence: Sequence) -> Option<Registered<P>> {
        match self.entries.get(key) {
            Some(entry) if entry.sequence == sequence => {}
            _ => return None,
        }
        self.entries.remove(key).map(|entry| Registered {
            key: key.clone(),
            sequence: entry.sequence,
            payload: entry.payload,
        })
    }

    /// Cancels the timer and drops the entry. Returns the dropped sequence.
    pub(crate) fn force_remove(&mut self, key: &Key) -> Option<Sequence> {
        let entry = self.entries.remove(key)?;
        entry.timer.cancel();
        Some(entry.sequence)
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.keys()
    }

    /// Cancels every timer and empties the table.
    pub(crate) fn clear(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.timer.cancel();
        }
    }
}
