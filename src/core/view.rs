//! # Aggregate loading view.
//!
//! Pure derived state, recomputed by the dispatcher after every command:
//! `loading_keys = keys(Debounce) ∪ keys(Initializing) ∪ keys(Active)` and
//! `is_loading = !loading_keys.is_empty()`. Observers are notified only when
//! the value actually changes.

use std::collections::BTreeSet;

use tokio::sync::watch;

use crate::core::invocation::Key;

pub(crate) struct LoadingView {
    keys: watch::Sender<BTreeSet<Key>>,
    loading: watch::Sender<bool>,
}

impl LoadingView {
    pub(crate) fn new() -> Self {
        let (keys, _) = watch::channel(BTreeSet::new());
        let (loading, _) = watch::channel(false);
        Self { keys, loading }
    }

    pub(crate) fn keys(&self) -> watch::Receiver<BTreeSet<Key>> {
        self.keys.subscribe()
    }

    pub(crate) fn loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub(crate) fn publish<'a>(&self, keys: impl IntoIterator<Item = &'a Key>) {
        let next: BTreeSet<Key> = keys.into_iter().cloned().collect();
        let busy = !next.is_empty();

        self.keys.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        self.loading.send_if_modified(|current| {
            let changed = *current != busy;
            *current = busy;
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_is_deduplicated_and_flag_follows() {
        let view = LoadingView::new();
        let keys = view.keys();
        let loading = view.loading();

        let (a, b) = (Key::from("a"), Key::from("b"));
        view.publish([&a, &b, &a]);
        assert_eq!(keys.borrow().len(), 2);
        assert!(*loading.borrow());

        view.publish(std::iter::empty());
        assert!(keys.borrow().is_empty());
        assert!(!*loading.borrow());
    }

    #[test]
    fn unchanged_value_does_not_notify() {
        let view = LoadingView::new();
        let mut keys = view.keys();
        let a = Key::from("a");

        view.publish([&a]);
        assert!(keys.has_changed().unwrap());
        keys.borrow_and_update();

        view.publish([&a]);
        assert!(!keys.has_changed().unwrap());
    }
}
