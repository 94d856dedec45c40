#![forbid(unsafe_code)]

//! Bare change sources.
//!
//! An [`Atom`] carries no value. Containers that manage their own storage
//! (the observable tree's map and list slots) pair each slot with an atom and
//! report reads and writes through it.

use crate::runtime::{self, Subscription};

/// Identifier of an atom inside the thread-local runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(pub(crate) u64);

impl AtomId {
    /// Raw numeric value, useful in logs.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// A change source with a unique identity.
///
/// `Atom` is `Copy`: copies refer to the same source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom {
    id: AtomId,
}

impl Default for Atom {
    fn default() -> Self {
        Self::new()
    }
}

impl Atom {
    /// Allocate a fresh atom.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: runtime::next_atom_id(),
        }
    }

    #[must_use]
    pub const fn id(self) -> AtomId {
        self.id
    }

    /// Record a read in the innermost tracking frame, if any.
    pub fn report_read(self) {
        runtime::report_read(self.id);
    }

    /// Notify dependents. Deferred while a batch is open.
    pub fn report_changed(self) {
        runtime::report_changed(self.id);
    }

    /// Run `callback` every time this atom reports a change.
    pub fn subscribe(self, callback: impl Fn() + 'static) -> Subscription {
        let callback: runtime::Callback = std::rc::Rc::new(callback);
        runtime::listen(self.id, &callback)
    }

    /// Number of live listeners currently registered.
    #[must_use]
    pub fn listener_count(self) -> usize {
        runtime::listener_count(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn atoms_are_distinct() {
        let a = Atom::new();
        let b = Atom::new();
        assert_ne!(a, b);
        assert_eq!(a, a);
    }

    #[test]
    fn subscribe_and_drop() {
        let atom = Atom::new();
        let hits = Rc::new(Cell::new(0));
        let hits_clone = Rc::clone(&hits);
        let sub = atom.subscribe(move || hits_clone.set(hits_clone.get() + 1));
        assert_eq!(atom.listener_count(), 1);

        atom.report_changed();
        assert_eq!(hits.get(), 1);

        drop(sub);
        assert_eq!(atom.listener_count(), 0);
        atom.report_changed();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn reads_are_tracked() {
        let atom = Atom::new();
        let ((), atoms) = crate::track(|| atom.report_read());
        assert_eq!(atoms, vec![atom.id()]);
    }

    #[test]
    fn untracked_reads_are_invisible() {
        let atom = Atom::new();
        let ((), atoms) = crate::track(|| crate::untracked(|| atom.report_read()));
        assert!(atoms.is_empty());
    }

    #[test]
    fn repeated_reads_recorded_once() {
        let a = Atom::new();
        let b = Atom::new();
        let ((), atoms) = crate::track(|| {
            a.report_read();
            b.report_read();
            a.report_read();
        });
        assert_eq!(atoms, vec![a.id(), b.id()]);
    }
}
