#![forbid(unsafe_code)]

//! Auto-tracked reactions.
//!
//! A [`Reaction`] pairs a tracked expression with an effect. The expression
//! runs once on creation; every atom it reads becomes a dependency. When any
//! dependency changes the expression runs again (dependencies are re-collected
//! on every run) and the effect fires with `(new, old)` only if the results
//! differ by `PartialEq`.
//!
//! The effect never runs on creation.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::runtime::{self, Callback, Subscription};

trait ReactionHandle {
    fn dispose(&self);
    fn is_disposed(&self) -> bool;
    fn dependency_count(&self) -> usize;
}

struct ReactionCore<T> {
    expr: Box<dyn Fn() -> T>,
    effect: RefCell<Box<dyn FnMut(&T, &T)>>,
    last: RefCell<Option<T>>,
    deps: RefCell<Vec<Subscription>>,
    trigger: Callback,
    disposed: Cell<bool>,
}

impl<T: PartialEq + 'static> ReactionCore<T> {
    fn track(&self) -> T {
        let (value, atoms) = runtime::track(|| (self.expr)());
        let subscriptions = atoms
            .into_iter()
            .map(|atom| runtime::listen(atom, &self.trigger))
            .collect();
        drop(self.deps.replace(subscriptions));
        value
    }

    fn rerun(&self) {
        if self.disposed.get() {
            return;
        }
        let next = self.track();
        let previous = self.last.borrow_mut().take();
        if let Some(previous) = previous.as_ref()
            && *previous != next
        {
            let mut effect = self.effect.borrow_mut();
            (&mut **effect)(&next, previous);
        }
        if !self.disposed.get() {
            *self.last.borrow_mut() = Some(next);
        }
    }
}

impl<T: PartialEq + 'static> ReactionHandle for ReactionCore<T> {
    fn dispose(&self) {
        self.disposed.set(true);
        self.deps.borrow_mut().clear();
        self.last.borrow_mut().take();
    }

    fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    fn dependency_count(&self) -> usize {
        self.deps.borrow().len()
    }
}

/// A tracked expression plus an effect that fires when its result changes.
///
/// Dropping the handle disposes the reaction.
pub struct Reaction {
    core: Rc<dyn ReactionHandle>,
}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaction")
            .field("disposed", &self.core.is_disposed())
            .field("dependencies", &self.core.dependency_count())
            .finish()
    }
}

impl Reaction {
    /// Create a reaction. `expr` runs immediately to collect dependencies.
    pub fn new<T, E, F>(expr: E, effect: F) -> Self
    where
        T: PartialEq + 'static,
        E: Fn() -> T + 'static,
        F: FnMut(&T, &T) + 'static,
    {
        let core = Rc::new_cyclic(|weak: &Weak<ReactionCore<T>>| {
            let weak = weak.clone();
            ReactionCore {
                expr: Box::new(expr),
                effect: RefCell::new(Box::new(effect)),
                last: RefCell::new(None),
                deps: RefCell::new(Vec::new()),
                trigger: Rc::new(move || {
                    if let Some(core) = weak.upgrade() {
                        core.rerun();
                    }
                }),
                disposed: Cell::new(false),
            }
        });
        let initial = core.track();
        *core.last.borrow_mut() = Some(initial);
        Self { core }
    }

    /// Re-run `body` whenever anything it read changes.
    pub fn autorun(body: impl Fn() + 'static) -> Self {
        Self::new(body, |_: &(), _: &()| {})
    }

    /// Stop reacting and release all dependencies.
    pub fn dispose(&self) {
        self.core.dispose();
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    /// Number of atoms read by the last run of the expression.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.core.dependency_count()
    }
}

impl Drop for Reaction {
    fn drop(&mut self) {
        self.core.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Observable, action};

    fn counter() -> (Rc<Cell<u32>>, impl Fn() + Clone) {
        let hits = Rc::new(Cell::new(0));
        let hits_clone = Rc::clone(&hits);
        (hits, move || hits_clone.set(hits_clone.get() + 1))
    }

    #[test]
    fn effect_not_run_on_creation() {
        let obs = Observable::new(1);
        let (hits, bump) = counter();
        let _r = Reaction::new(move || obs.get(), move |_, _| bump());
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn effect_receives_new_and_old() {
        let obs = Observable::new(1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        let source = obs.clone();
        let _r = Reaction::new(
            move || source.get(),
            move |new, old| seen_clone.borrow_mut().push((*new, *old)),
        );
        obs.set(2);
        obs.set(5);
        assert_eq!(*seen.borrow(), vec![(2, 1), (5, 2)]);
    }

    #[test]
    fn unchanged_result_skips_effect() {
        let obs = Observable::new(3);
        let (hits, bump) = counter();
        let source = obs.clone();
        let _r = Reaction::new(move || source.get() % 2, move |_, _| bump());
        obs.set(5);
        assert_eq!(hits.get(), 0);
        obs.set(6);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn dependencies_follow_branches() {
        let flag = Observable::new(true);
        let left = Observable::new(1);
        let right = Observable::new(100);
        let (f, l, r) = (flag.clone(), left.clone(), right.clone());
        let (hits, bump) = counter();
        let reaction = Reaction::new(
            move || if f.get() { l.get() } else { r.get() },
            move |_, _| bump(),
        );
        assert_eq!(reaction.dependency_count(), 2);

        right.set(200);
        assert_eq!(hits.get(), 0);

        flag.set(false);
        assert_eq!(hits.get(), 1);
        left.set(2);
        assert_eq!(hits.get(), 1);
        right.set(300);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn one_effect_per_action() {
        let a = Observable::new(0);
        let b = Observable::new(0);
        let (sa, sb) = (a.clone(), b.clone());
        let (hits, bump) = counter();
        let _r = Reaction::new(move || sa.get() + sb.get(), move |_, _| bump());
        action(|| {
            a.set(1);
            b.set(2);
        });
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn dispose_stops_effects() {
        let obs = Observable::new(0);
        let (hits, bump) = counter();
        let source = obs.clone();
        let reaction = Reaction::new(move || source.get(), move |_, _| bump());
        reaction.dispose();
        assert!(reaction.is_disposed());
        assert_eq!(obs.atom().listener_count(), 0);
        obs.set(1);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn drop_releases_listeners() {
        let obs = Observable::new(0);
        {
            let source = obs.clone();
            let _r = Reaction::new(move || source.get(), |_, _| {});
            assert_eq!(obs.atom().listener_count(), 1);
        }
        assert_eq!(obs.atom().listener_count(), 0);
    }

    #[test]
    fn autorun_reruns_body() {
        let obs = Observable::new(1);
        let total = Rc::new(Cell::new(0));
        let total_clone = Rc::clone(&total);
        let source = obs.clone();
        let _r = Reaction::autorun(move || total_clone.set(total_clone.get() + source.get()));
        assert_eq!(total.get(), 1);
        obs.set(10);
        assert_eq!(total.get(), 11);
    }

    #[test]
    fn effect_writes_are_delivered_after_effect() {
        let input = Observable::new(0);
        let output = Observable::new(0);
        let (src, out) = (input.clone(), output.clone());
        let _forward = Reaction::new(move || src.get(), move |new, _| {
            out.set(*new * 2);
        });
        let (hits, bump) = counter();
        let watched = output.clone();
        let _watch = Reaction::new(move || watched.get(), move |_, _| bump());

        input.set(4);
        assert_eq!(output.get_untracked(), 8);
        assert_eq!(hits.get(), 1);
    }
}
