//! Per-key slot: value, generation counter, and waiter bookkeeping.
//!
//! A waiter entering at generation `g` registers interest in generation
//! `g + 1`. The write that produces `g + 1` parks a copy of its value in
//! the matching [`Pending`] entry, so every waiter for that generation
//! receives exactly that value even if later writes land before it is
//! scheduled. The entry is dropped once its last waiter has taken it.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use smallvec::SmallVec;

/// Why a slot no longer accepts operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Closed {
    Stopped,
    Retired,
}

/// Waiters for one target generation.
struct Pending<V> {
    target: u64,
    waiters: usize,
    value: Option<V>,
}

pub(crate) struct SlotState<V> {
    pub(crate) value: V,
    pub(crate) generation: u64,
    pub(crate) written_at: Option<Instant>,
    pub(crate) closed: Option<Closed>,
    pending: SmallVec<[Pending<V>; 2]>,
}

/// Outcome of one poll of a waiter's registration.
pub(crate) enum Poll<V> {
    Ready(V),
    Closed(Closed),
    Waiting,
}

impl<V: Clone> SlotState<V> {
    /// Replace the value, bump the generation, and hand the value to
    /// waiters registered for the new generation. Returns whether
    /// anyone is waiting.
    pub(crate) fn write(&mut self, value: V) -> bool {
        self.generation += 1;
        self.written_at = Some(Instant::now());
        let generation = self.generation;
        if let Some(p) = self.pending.iter_mut().find(|p| p.target == generation) {
            p.value = Some(value.clone());
        }
        self.value = value;
        !self.pending.is_empty()
    }

    /// Register a waiter for the next write; returns its target.
    pub(crate) fn enter(&mut self) -> u64 {
        let target = self.generation + 1;
        match self.pending.iter_mut().find(|p| p.target == target) {
            Some(p) => p.waiters += 1,
            None => self.pending.push(Pending {
                target,
                waiters: 1,
                value: None,
            }),
        }
        target
    }

    /// Check a waiter's registration. A delivered value wins over a
    /// concurrent close: the write happened first. On `Ready` or
    /// `Closed` the waiter is deregistered.
    pub(crate) fn poll(&mut self, target: u64) -> Poll<V> {
        let delivered = self
            .pending
            .iter()
            .find(|p| p.target == target)
            .and_then(|p| p.value.clone());
        if let Some(v) = delivered {
            self.leave(target);
            return Poll::Ready(v);
        }
        if let Some(c) = self.closed {
            self.leave(target);
            return Poll::Closed(c);
        }
        Poll::Waiting
    }

    /// Deregister a waiter (delivered, closed, or timed out).
    pub(crate) fn leave(&mut self, target: u64) {
        if let Some(i) = self.pending.iter().position(|p| p.target == target) {
            self.pending[i].waiters -= 1;
            if self.pending[i].waiters == 0 {
                self.pending.remove(i);
            }
        }
    }

    /// Waiters registered and not yet departed.
    pub(crate) fn waiters(&self) -> usize {
        self.pending.iter().map(|p| p.waiters).sum()
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

pub(crate) struct Slot<V> {
    state: Mutex<SlotState<V>>,
    pub(crate) changed: Condvar,
}

impl<V: Default> Slot<V> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                value: V::default(),
                generation: 0,
                written_at: None,
                closed: None,
                pending: SmallVec::new(),
            }),
            changed: Condvar::new(),
        }
    }
}

impl<V> Slot<V> {
    /// Lock the slot. Slots hold whole values, so a writer that
    /// panicked cannot have left one half-written: recover the guard.
    pub(crate) fn lock(&self) -> MutexGuard<'_, SlotState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the slot closed and wake every waiter.
    pub(crate) fn close(&self, why: Closed) {
        let mut st = self.lock();
        if st.closed.is_none() {
            st.closed = Some(why);
        }
        drop(st);
        self.changed.notify_all();
    }
}
