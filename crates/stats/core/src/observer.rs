//! Synchronous listener lists.
//!
//! Notification is inline: every listener runs on the caller's stack before
//! the notifying call returns. Listeners are snapshotted before delivery so a
//! listener may subscribe or unsubscribe others while running.
//!
//! Lists hold shared handles. `Fn` listeners may be re-entered and guard their
//! own state; `RefCell`-wrapped `FnMut` listeners go through [`deliver`], which
//! never re-enters one that is still running.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use tracing::warn;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

type Entry<F> = (ListenerId, Rc<F>);

pub(crate) struct Listeners<F: ?Sized> {
    next_id: u64,
    entries: Vec<Entry<F>>,
}

impl<F: ?Sized> Listeners<F> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, listener: Rc<F>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn snapshot(&self) -> Vec<Entry<F>> {
        self.entries
            .iter()
            .map(|(id, listener)| (*id, Rc::clone(listener)))
            .collect()
    }
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for Listeners<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

/// Runs `call` on every mutable listener in `entries`, skipping any that is
/// busy.
pub(crate) fn deliver<F: ?Sized>(
    target: &'static str,
    entries: Vec<Entry<RefCell<F>>>,
    mut call: impl FnMut(&mut F),
) {
    for (id, listener) in entries {
        match listener.try_borrow_mut() {
            Ok(mut listener) => call(&mut *listener),
            Err(_) => warn!(
                target: "stats::observer",
                source = target,
                listener = id.0,
                "dropping re-entrant notification"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove() {
        let mut listeners: Listeners<RefCell<dyn FnMut(u32)>> = Listeners::new();
        let a = listeners.insert(Rc::new(RefCell::new(|_: u32| {})));
        let b = listeners.insert(Rc::new(RefCell::new(|_: u32| {})));
        assert_ne!(a, b);
        assert_eq!(listeners.len(), 2);
        assert!(listeners.remove(a));
        assert!(!listeners.remove(a));
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn deliver_calls_each_listener_once() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut listeners: Listeners<RefCell<dyn FnMut(u32)>> = Listeners::new();
        for tag in 0..3u32 {
            let seen = Rc::clone(&seen);
            listeners.insert(Rc::new(RefCell::new(move |value: u32| {
                seen.borrow_mut().push((tag, value))
            })));
        }
        deliver("test", listeners.snapshot(), |listener| listener(7));
        assert_eq!(*seen.borrow(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn busy_listener_is_skipped() {
        let count = Rc::new(RefCell::new(0));
        let mut listeners: Listeners<RefCell<dyn FnMut(u32)>> = Listeners::new();
        let counter = Rc::clone(&count);
        listeners.insert(Rc::new(RefCell::new(move |_: u32| {
            *counter.borrow_mut() += 1
        })));
        let entries = listeners.snapshot();
        let _busy = entries[0].1.borrow_mut();
        deliver("test", listeners.snapshot(), |listener| listener(1));
        assert_eq!(*count.borrow(), 0);
    }
}
