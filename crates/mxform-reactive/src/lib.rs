#![forbid(unsafe_code)]

//! Fine-grained reactivity for mxform.
//!
//! This crate provides the change-tracking primitives the observable form
//! tree is built on:
//!
//! - [`Atom`]: a bare change source. Reading it inside a tracked computation
//!   records a dependency; reporting a change wakes its dependents.
//! - [`Observable`]: a shared, version-tracked value cell built on an atom.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`BatchScope`] / [`action`]: defer notifications until the outermost
//!   scope exits, so one batch of writes produces one notification cycle.
//! - [`Reaction`]: re-runs a tracked expression when any atom it read
//!   changes, and fires its effect only when the result differs.
//! - [`Computed`]: a lazily-evaluated, memoized derived value.
//!
//! # Architecture
//!
//! All state lives in a thread-local runtime. Handles use `Rc`/`RefCell` and
//! are `!Send`. Listener callbacks are stored as `Weak` pointers; the owning
//! [`Subscription`] keeps them alive.
//!
//! # Invariants
//!
//! 1. A read is recorded only by the innermost tracking frame.
//! 2. Listeners of one atom are notified in registration order.
//! 3. Within one flush round a listener runs at most once, even when several
//!    of its atoms changed.
//! 4. Within a `BatchScope`, values are updated immediately but
//!    notifications are deferred until the outermost scope exits.
//! 5. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.

pub mod atom;
pub mod batch;
pub mod computed;
pub mod observable;
pub mod reaction;
mod runtime;

pub use atom::{Atom, AtomId};
pub use batch::{BatchScope, action, is_batching};
pub use computed::Computed;
pub use observable::Observable;
pub use reaction::Reaction;
pub use runtime::{Subscription, track, untracked};
