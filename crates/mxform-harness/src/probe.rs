//! Reaction counters for tests.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use mxform_reactive::Reaction;

/// Watches a tracked expression and records every value it changes to.
///
/// The initial evaluation is not recorded; [`count`](Self::count) is the
/// number of times the effect fired.
pub struct ReactionProbe<T> {
    seen: Rc<RefCell<Vec<T>>>,
    reaction: Reaction,
}

impl<T: Clone + PartialEq + 'static> ReactionProbe<T> {
    pub fn new(expr: impl Fn() -> T + 'static) -> Self {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let reaction = Reaction::new(expr, move |next: &T, _previous: &T| {
            sink.borrow_mut().push(next.clone());
        });
        Self { seen, reaction }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.seen.borrow().len()
    }

    #[must_use]
    pub fn values(&self) -> Vec<T> {
        self.seen.borrow().clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<T> {
        self.seen.borrow().last().cloned()
    }

    pub fn dispose(&self) {
        self.reaction.dispose();
    }
}

impl<T> fmt::Debug for ReactionProbe<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionProbe")
            .field("count", &self.seen.borrow().len())
            .field("reaction", &self.reaction)
            .finish()
    }
}
