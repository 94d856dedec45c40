#![forbid(unsafe_code)]

//! Thread-local dependency tracking and notification dispatch.
//!
//! # Design
//!
//! The runtime keeps three pieces of state per thread:
//!
//! - a stack of tracking frames; reads are recorded into the innermost one,
//! - a listener table mapping each [`AtomId`] to weak callbacks,
//! - a pending set of changed atoms plus a batch depth counter.
//!
//! A change is always queued first. When no batch is open the queue is
//! flushed immediately; otherwise the outermost [`BatchScope`] flushes it on
//! exit. Flushing runs in rounds: every round drains the queue, collects the
//! distinct live callbacks of the drained atoms and runs them with the batch
//! depth raised, so writes made by callbacks land in the next round.
//!
//! [`BatchScope`]: crate::BatchScope

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::{AHashMap, AHashSet};

use crate::atom::AtomId;

pub(crate) type Callback = Rc<dyn Fn()>;

/// Upper bound on cascading flush rounds before the queue is dropped.
const MAX_FLUSH_ROUNDS: usize = 100;

struct Listener {
    id: u64,
    callback: Weak<dyn Fn()>,
}

#[derive(Default)]
struct Frame {
    seen: AHashSet<AtomId>,
    order: Vec<AtomId>,
}

struct Runtime {
    next_atom: Cell<u64>,
    next_listener: Cell<u64>,
    /// `None` frames suspend tracking (see [`untracked`]).
    frames: RefCell<Vec<Option<Frame>>>,
    listeners: RefCell<AHashMap<AtomId, Vec<Listener>>>,
    depth: Cell<usize>,
    pending: RefCell<Vec<AtomId>>,
    pending_set: RefCell<AHashSet<AtomId>>,
}

impl Runtime {
    fn new() -> Self {
        Self {
            next_atom: Cell::new(1),
            next_listener: Cell::new(1),
            frames: RefCell::new(Vec::new()),
            listeners: RefCell::new(AHashMap::new()),
            depth: Cell::new(0),
            pending: RefCell::new(Vec::new()),
            pending_set: RefCell::new(AHashSet::new()),
        }
    }
}

thread_local! {
    static RUNTIME: Runtime = Runtime::new();
}

pub(crate) fn next_atom_id() -> AtomId {
    RUNTIME.with(|rt| {
        let id = rt.next_atom.get();
        rt.next_atom.set(id + 1);
        AtomId(id)
    })
}

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

/// Pops the frame it pushed, also when the tracked closure unwinds.
struct FrameGuard {
    armed: bool,
}

impl FrameGuard {
    fn push(frame: Option<Frame>) -> Self {
        RUNTIME.with(|rt| rt.frames.borrow_mut().push(frame));
        Self { armed: true }
    }

    fn finish(mut self) -> Option<Frame> {
        self.armed = false;
        RUNTIME.with(|rt| rt.frames.borrow_mut().pop()).flatten()
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = RUNTIME.try_with(|rt| rt.frames.borrow_mut().pop());
        }
    }
}

/// Run `f` in a fresh tracking frame and return its result together with
/// every atom it read, in first-read order.
pub fn track<R>(f: impl FnOnce() -> R) -> (R, Vec<AtomId>) {
    let guard = FrameGuard::push(Some(Frame::default()));
    let value = f();
    let atoms = guard.finish().map(|frame| frame.order).unwrap_or_default();
    (value, atoms)
}

/// Run `f` without recording any reads into the enclosing tracking frame.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let guard = FrameGuard::push(None);
    let value = f();
    drop(guard);
    value
}

pub(crate) fn report_read(atom: AtomId) {
    RUNTIME.with(|rt| {
        let mut frames = rt.frames.borrow_mut();
        if let Some(Some(frame)) = frames.last_mut()
            && frame.seen.insert(atom)
        {
            frame.order.push(atom);
        }
    });
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// RAII guard for a listener registered on an atom.
///
/// Dropping the subscription removes the listener. The callback itself is
/// owned here; the runtime only holds a weak pointer to it.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    atom: AtomId,
    id: u64,
    _callback: Callback,
}

impl Subscription {
    /// The atom this subscription listens to.
    #[must_use]
    pub fn atom(&self) -> AtomId {
        self.atom
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("atom", &self.atom)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = RUNTIME.try_with(|rt| {
            let mut listeners = rt.listeners.borrow_mut();
            if let Some(list) = listeners.get_mut(&self.atom) {
                list.retain(|listener| listener.id != self.id);
                if list.is_empty() {
                    listeners.remove(&self.atom);
                }
            }
        });
    }
}

/// Register `callback` on `atom`. The same callback may be registered on
/// many atoms; it still runs once per flush round.
pub(crate) fn listen(atom: AtomId, callback: &Callback) -> Subscription {
    let id = RUNTIME.with(|rt| {
        let id = rt.next_listener.get();
        rt.next_listener.set(id + 1);
        rt.listeners
            .borrow_mut()
            .entry(atom)
            .or_default()
            .push(Listener {
                id,
                callback: Rc::downgrade(callback),
            });
        id
    });
    Subscription {
        atom,
        id,
        _callback: Rc::clone(callback),
    }
}

pub(crate) fn listener_count(atom: AtomId) -> usize {
    RUNTIME.with(|rt| {
        rt.listeners
            .borrow()
            .get(&atom)
            .map_or(0, |list| {
                list.iter()
                    .filter(|listener| listener.callback.strong_count() > 0)
                    .count()
            })
    })
}

// ---------------------------------------------------------------------------
// Batching and dispatch
// ---------------------------------------------------------------------------

pub(crate) fn enter_batch() {
    RUNTIME.with(|rt| rt.depth.set(rt.depth.get() + 1));
}

/// Leave one batch level. Returns `true` when the outermost level closed.
pub(crate) fn exit_batch() -> bool {
    RUNTIME
        .try_with(|rt| {
            let depth = rt.depth.get().saturating_sub(1);
            rt.depth.set(depth);
            depth == 0
        })
        .unwrap_or(false)
}

pub(crate) fn batch_depth() -> usize {
    RUNTIME.with(|rt| rt.depth.get())
}

/// Raises the depth for the duration of a flush round without flushing on
/// exit.
struct DispatchGuard;

impl DispatchGuard {
    fn enter() -> Self {
        enter_batch();
        Self
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        let _ = exit_batch();
    }
}

pub(crate) fn report_changed(atom: AtomId) {
    let idle = RUNTIME.with(|rt| {
        if rt.pending_set.borrow_mut().insert(atom) {
            rt.pending.borrow_mut().push(atom);
        }
        rt.depth.get() == 0
    });
    if idle {
        flush();
    }
}

fn collect_callbacks(rt: &Runtime, atoms: &[AtomId]) -> Vec<Callback> {
    let mut listeners = rt.listeners.borrow_mut();
    let mut seen: AHashSet<*const ()> = AHashSet::new();
    let mut callbacks = Vec::new();
    for atom in atoms {
        let Some(list) = listeners.get_mut(atom) else {
            continue;
        };
        list.retain(|listener| listener.callback.strong_count() > 0);
        for listener in list.iter() {
            if let Some(callback) = listener.callback.upgrade()
                && seen.insert(Rc::as_ptr(&callback).cast::<()>())
            {
                callbacks.push(callback);
            }
        }
    }
    callbacks
}

pub(crate) fn flush() {
    for round in 0..MAX_FLUSH_ROUNDS {
        let (changed, callbacks) = RUNTIME.with(|rt| {
            let atoms = std::mem::take(&mut *rt.pending.borrow_mut());
            rt.pending_set.borrow_mut().clear();
            let callbacks = collect_callbacks(rt, &atoms);
            (atoms.len(), callbacks)
        });
        if changed == 0 {
            return;
        }
        tracing::trace!(
            message = "reactive.flush.round",
            round,
            changed,
            listeners = callbacks.len()
        );
        let _dispatch = DispatchGuard::enter();
        for callback in &callbacks {
            callback();
        }
    }

    let dropped = RUNTIME.with(|rt| {
        rt.pending_set.borrow_mut().clear();
        std::mem::take(&mut *rt.pending.borrow_mut()).len()
    });
    tracing::warn!(
        message = "reactive.flush.cycle",
        rounds = MAX_FLUSH_ROUNDS,
        dropped
    );
}
