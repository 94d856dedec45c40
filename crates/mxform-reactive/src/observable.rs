#![forbid(unsafe_code)]

//! Shared, version-tracked value cells.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Setting a value equal to the current value is a no-op (no version bump,
//!    no notifications).
//! 3. `get()` and `with()` register a read in the active tracking frame;
//!    `get_untracked()` does not.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::atom::Atom;
use crate::runtime::Subscription;

struct ObservableInner<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    atom: Atom,
}

/// A shared value with change notification.
///
/// Cloning an `Observable` creates a new handle to the **same** value.
pub struct Observable<T> {
    inner: Rc<ObservableInner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

impl<T: Default + Clone + PartialEq + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                value: RefCell::new(value),
                version: Cell::new(0),
                atom: Atom::new(),
            }),
        }
    }

    /// Current value; registers a read.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.atom.report_read();
        self.inner.value.borrow().clone()
    }

    /// Current value without registering a read.
    #[must_use]
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value; registers a read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.atom.report_read();
        f(&self.inner.value.borrow())
    }

    /// Replace the value. Returns `true` if it changed.
    pub fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.inner.version.set(self.inner.version.get() + 1);
        self.inner.atom.report_changed();
        true
    }

    /// Mutate a copy of the value and store it if it differs.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut next = self.get_untracked();
        f(&mut next);
        self.set(next)
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// The atom reporting this value's reads and changes.
    #[must_use]
    pub fn atom(&self) -> Atom {
        self.inner.atom
    }

    /// Call `callback` with the new value after every change.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let weak = Rc::downgrade(&self.inner);
        self.inner.atom.subscribe(move || {
            if let Some(inner) = weak.upgrade() {
                let value = inner.value.borrow().clone();
                callback(&value);
            }
        })
    }
}
