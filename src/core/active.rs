//! # Active stage.
//!
//! Tracks, per key, the operation whose result is awaited. Inserting over an
//! existing entry hands the replaced entry back so the dispatcher cancels it.
//! A settlement is accepted only while the stored sequence is not newer.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::core::invocation::{Key, Sequence};
use crate::operation::CancelHandle;

pub(crate) struct ActiveEntry {
    pub sequence: Sequence,
    /// Operation-supplied cancellation.
    pub cancel: Option<CancelHandle>,
    /// Stops the task awaiting the result.
    pub watch: CancellationToken,
}

impl ActiveEntry {
    /// Stops waiting and invokes the operation's cancel handle once.
    pub(crate) fn cancel(self) {
        self.watch.cancel();
        if let Some(cancel) = self.cancel {
            cancel.cancel();
        }
    }
}

pub(crate) struct ActiveTable {
    entries: HashMap<Key, ActiveEntry>,
}

impl ActiveTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub(crate) fn sequence_of(&self, key: &Key) -> Option<Sequence> {
        self.entries.get(key).map(|e| e.sequence)
    }

    /// Stores `entry`, returning the one it replaces.
    pub(crate) fn insert(&mut self, key: Key, entry: ActiveEntry) -> Option<ActiveEntry> {
        self.entries.insert(key, entry)
    }

    /// Removes the entry if nothing newer than `sequence` replaced it.
    pub(crate) fn remove_current(&mut self, key: &Key, sequence: Sequence) -> bool {
        match self.sequence_of(key) {
            Some(stored) if stored <= sequence => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.keys()
    }

    /// Cancels every entry and empties the table.
    pub(crate) fn cancel_all(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.cancel();
        }
    }
}
