#![forbid(unsafe_code)]

//! Memoized derived values.
//!
//! # Design
//!
//! A [`Computed<T>`] holds a closure and the result of its last run. The
//! closure runs inside a tracking frame; each atom it reads gets a listener
//! that marks the cache stale and reports a change on the computed's own
//! atom, so a reaction reading a computed re-runs when its inputs move.
//! Dependencies are re-collected on every run, so a branch that stops
//! reading an atom also stops listening to it.
//!
//! # Invariants
//!
//! 1. A read after a completed write never returns the pre-write result.
//! 2. The closure runs at most once between two invalidations.
//! 3. `version` counts runs of the closure.
//!
//! # Failure Modes
//!
//! - **Closure panics**: the cache stays stale and the next read retries.
//! - **Source dropped**: its listener goes inert and the last result stays
//!   cached.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::atom::Atom;
use crate::runtime::{self, Callback, Subscription};

struct ComputedInner<T> {
    compute: Box<dyn Fn() -> T>,
    /// `None` until the first read.
    cached: RefCell<Option<T>>,
    dirty: Cell<bool>,
    version: Cell<u64>,
    /// Reports reads of this computed and its invalidations.
    atom: Atom,
    /// Subscriptions on the atoms read by the last computation.
    deps: RefCell<Vec<Subscription>>,
    /// Marks the value dirty; shared by every dependency subscription.
    invalidate: Callback,
}

/// A value derived from tracked reads, recomputed on demand.
///
/// Clones share one cache.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("cached", &*self.inner.cached.borrow())
            .field("dirty", &self.inner.dirty.get())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a computed value. Nothing runs until the first read.
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            ComputedInner {
                compute: Box::new(compute),
                cached: RefCell::new(None),
                dirty: Cell::new(true),
                version: Cell::new(0),
                atom: Atom::new(),
                deps: RefCell::new(Vec::new()),
                invalidate: Rc::new(move || {
                    if let Some(inner) = weak.upgrade()
                        && !inner.dirty.replace(true)
                    {
                        inner.atom.report_changed();
                    }
                }),
            }
        });
        Self { inner }
    }

    fn recompute(&self) -> T {
        let (value, atoms) = runtime::track(|| (self.inner.compute)());
        let subscriptions = atoms
            .into_iter()
            .map(|atom| runtime::listen(atom, &self.inner.invalidate))
            .collect();
        drop(self.inner.deps.replace(subscriptions));
        self.inner.dirty.set(false);
        self.inner.version.set(self.inner.version.get() + 1);
        value
    }

    /// The current value; reruns the closure if an input changed.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Borrow the current value. Counts as a tracked read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.atom.report_read();
        let cached = if self.inner.dirty.get() {
            None
        } else {
            self.inner.cached.borrow_mut().take()
        };
        let value = match cached {
            Some(value) => value,
            None => self.recompute(),
        };
        let result = f(&value);
        *self.inner.cached.borrow_mut() = Some(value);
        result
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Mark the cache stale and notify readers.
    pub fn invalidate(&self) {
        (self.inner.invalidate)();
    }

    /// Number of closure runs so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }
}
