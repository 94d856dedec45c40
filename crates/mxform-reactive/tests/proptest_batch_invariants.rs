//! Property tests for notification delivery.
//!
//! 1. Outside a batch every effective write notifies exactly once.
//! 2. Inside an action a subscriber runs at most once and sees the final
//!    value.
//! 3. A reaction's effect fires once per change of its derived value.
//! 4. A computed value always equals its expression over current state.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mxform_reactive::{Computed, Observable, Reaction, action};
use proptest::prelude::*;

fn writes() -> impl Strategy<Value = Vec<i32>> {
    prop::collection::vec(-4i32..4, 0..32)
}

proptest! {
    #[test]
    fn unbatched_writes_notify_per_change(values in writes()) {
        let obs = Observable::new(0);
        let calls = Rc::new(Cell::new(0usize));
        let sink = Rc::clone(&calls);
        let _sub = obs.subscribe(move |_| sink.set(sink.get() + 1));

        let changed = values.iter().filter(|value| obs.set(**value)).count();
        prop_assert_eq!(calls.get(), changed);
        prop_assert_eq!(obs.version(), changed as u64);
    }

    #[test]
    fn batched_writes_notify_once_with_final_value(values in writes()) {
        let obs = Observable::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = obs.subscribe(move |value| sink.borrow_mut().push(*value));

        let changed = action(|| values.iter().filter(|value| obs.set(**value)).count());
        let seen = seen.borrow();
        if changed == 0 {
            prop_assert!(seen.is_empty());
        } else {
            prop_assert_eq!(seen.as_slice(), &[obs.get_untracked()]);
        }
    }

    #[test]
    fn reaction_fires_on_derived_change(values in writes()) {
        let obs = Observable::new(0i32);
        let watched = obs.clone();
        let fired = Rc::new(Cell::new(0usize));
        let sink = Rc::clone(&fired);
        let _reaction = Reaction::new(
            move || watched.get().rem_euclid(3),
            move |_: &i32, _: &i32| sink.set(sink.get() + 1),
        );

        let mut expected = 0;
        let mut last = 0;
        for value in &values {
            obs.set(*value);
            let derived = value.rem_euclid(3);
            if derived != last {
                expected += 1;
                last = derived;
            }
        }
        prop_assert_eq!(fired.get(), expected);
    }

    #[test]
    fn computed_tracks_sources(values in writes(), other in writes()) {
        let left = Observable::new(0);
        let right = Observable::new(0);
        let (l, r) = (left.clone(), right.clone());
        let sum = Computed::new(move || l.get() + r.get());

        for (index, value) in values.iter().enumerate() {
            left.set(*value);
            if let Some(value) = other.get(index) {
                right.set(*value);
            }
            prop_assert_eq!(sum.get(), left.get_untracked() + right.get_untracked());
        }
    }
}
