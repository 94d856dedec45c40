#![forbid(unsafe_code)]

//! Batched writes.
//!
//! A [`BatchScope`] defers every change notification until the outermost
//! scope exits. Values are written immediately; only dispatch waits. Nested
//! scopes are supported and only the outermost one flushes.

use std::marker::PhantomData;
use std::rc::Rc;

use crate::runtime;

/// RAII guard that defers notifications until dropped.
#[must_use = "the batch ends as soon as the scope is dropped"]
pub struct BatchScope {
    _not_send: PhantomData<Rc<()>>,
}

impl Default for BatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchScope {
    pub fn new() -> Self {
        runtime::enter_batch();
        Self {
            _not_send: PhantomData,
        }
    }

    /// Current nesting depth, including this scope.
    #[must_use]
    pub fn depth(&self) -> usize {
        runtime::batch_depth()
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        if runtime::exit_batch() && !std::thread::panicking() {
            runtime::flush();
        }
    }
}

/// Run `f` as one action: all writes inside are delivered to listeners in a
/// single notification cycle after `f` returns.
pub fn action<R>(f: impl FnOnce() -> R) -> R {
    let _scope = BatchScope::new();
    f()
}

/// Whether a batch (or a notification round) is currently open.
#[must_use]
pub fn is_batching() -> bool {
    runtime::batch_depth() > 0
}
