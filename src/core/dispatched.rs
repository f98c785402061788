//! # Dispatch log.
//!
//! Per key, the newest sequence that entered initialization. The quiet period
//! is measured from it, so a key whose operation already settled still
//! debounces calls that arrive within the window.
//!
//! Entries are dropped once the key is idle and its window has passed, which
//! bounds the log by the number of keys with recent activity.

use std::collections::HashMap;

use crate::core::invocation::{Key, Sequence};

pub(crate) struct DispatchLog {
    entries: HashMap<Key, Sequence>,
}

impl DispatchLog {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub(crate) fn last(&self, key: &Key) -> Option<Sequence> {
        self.entries.get(key).copied()
    }

    /// Records a dispatch; never moves the entry backwards.
    pub(crate) fn record(&mut self, key: &Key, sequence: Sequence) {
        let last = self.entries.entry(key.clone()).or_insert(sequence);
        if *last < sequence {
            *last = sequence;
        }
    }

    /// Forgets idle keys whose window ended at or before `now`.
    pub(crate) fn prune(&mut self, now: u64, window: u64, busy: impl Fn(&Key) -> bool) {
        let now = Sequence::new(now);
        self.entries
            .retain(|key, last| last.plus(window) > now || busy(key));
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: u64) -> Sequence {
        Sequence::new(v)
    }

    #[test]
    fn record_keeps_the_newest() {
        let mut log = DispatchLog::new();
        let k = Key::from("x");
        log.record(&k, s(50));
        log.record(&k, s(10));
        assert_eq!(log.last(&k), Some(s(50)));
        log.record(&k, s(300));
        assert_eq!(log.last(&k), Some(s(300)));
    }

    #[test]
    fn prune_drops_only_idle_expired_keys() {
        let mut log = DispatchLog::new();
        let (idle, busy, fresh) = (Key::from("idle"), Key::from("busy"), Key::from("fresh"));
        log.record(&idle, s(0));
        log.record(&busy, s(0));
        log.record(&fresh, s(150));

        log.prune(200, 200, |k| *k == busy);

        assert_eq!(log.last(&idle), None);
        assert_eq!(log.last(&busy), Some(s(0)));
        assert_eq!(log.last(&fresh), Some(s(150)));
        assert_eq!(log.len(), 2);
    }
}
