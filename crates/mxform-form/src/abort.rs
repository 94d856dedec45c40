//! Single-threaded abort signals.
//!
//! An [`AbortController`] owns the right to abort; its [`AbortSignal`] is a
//! cheap handle anyone can observe. A controller created with
//! [`AbortController::linked`] also aborts when the parent signal does, so a
//! form can be torn down by whoever owns the surrounding scope.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type AbortListener = Box<dyn FnOnce()>;

#[derive(Default)]
struct SignalInner {
    aborted: Cell<bool>,
    listeners: RefCell<Vec<AbortListener>>,
}

impl SignalInner {
    fn abort(&self) {
        if self.aborted.replace(true) {
            return;
        }
        let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        for listener in listeners {
            listener();
        }
    }
}

/// Observer side of an abort.
#[derive(Clone, Default)]
pub struct AbortSignal {
    inner: Rc<SignalInner>,
}

impl AbortSignal {
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.get()
    }

    /// Run `listener` once when the signal aborts. Runs immediately if it
    /// already has.
    pub fn on_abort(&self, listener: impl FnOnce() + 'static) {
        if self.is_aborted() {
            listener();
        } else {
            self.inner.listeners.borrow_mut().push(Box::new(listener));
        }
    }
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Owner side of an abort.
#[derive(Debug, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A controller that also aborts when `parent` does.
    #[must_use]
    pub fn linked(parent: Option<&AbortSignal>) -> Self {
        let controller = Self::new();
        if let Some(parent) = parent {
            let child: Weak<SignalInner> = Rc::downgrade(&controller.signal.inner);
            parent.on_abort(move || {
                if let Some(child) = child.upgrade() {
                    child.abort();
                }
            });
        }
        controller
    }

    #[must_use]
    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    pub fn abort(&self) {
        self.signal.inner.abort();
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.signal.is_aborted()
    }
}
