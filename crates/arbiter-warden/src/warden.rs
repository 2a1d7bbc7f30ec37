//! The keyed blocking store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use arbiter_core::{AgentKey, WardenError};
use indexmap::IndexMap;

use crate::slot::{Closed, Poll, Slot};

/// A value together with its write generation and write instant.
#[derive(Clone, Debug, PartialEq)]
pub struct Stamped<V> {
    /// The current value.
    pub value: V,
    /// Number of writes to the key since registration.
    pub generation: u64,
    /// Monotonic instant of the last write; `None` before the first.
    pub written_at: Option<Instant>,
}

impl<V> Stamped<V> {
    /// Time since the last write, or `None` if never written.
    pub fn age(&self) -> Option<Duration> {
        self.written_at.map(|t| t.elapsed())
    }
}

/// Concurrent map from [`AgentKey`] to a value slot with per-key
/// blocking reads.
///
/// # Semantics
///
/// - [`register`](Self::register) seeds a slot with `V::default()` at
///   generation 0. Registering a key twice fails with
///   [`WardenError::AlreadyRegistered`]; registration is not idempotent.
/// - [`read`](Self::read) and [`write`](Self::write) never block beyond
///   the one slot's critical section.
/// - [`await_next`](Self::await_next) returns the value of the first
///   write whose generation is strictly greater than the generation at
///   entry. Every waiter blocked at the moment of a write receives that
///   write's value, regardless of what is written afterwards.
/// - [`stop`](Self::stop) is terminal and idempotent: blocked and future
///   waiters fail with [`WardenError::StoreStopped`], as do all later
///   operations.
///
/// Callers always receive clones; nothing hands out a reference into a
/// slot.
pub struct Warden<V> {
    slots: RwLock<IndexMap<AgentKey, Arc<Slot<V>>>>,
    stopped: AtomicBool,
}

// Compile-time assertion: a store of sendable values is shareable.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Warden<arbiter_core::Trajectory>>();
    assert::<Warden<arbiter_core::VehicleState>>();
};

impl<V: Clone + Default> Default for Warden<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Default> Warden<V> {
    /// An empty, running store.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(IndexMap::new()),
            stopped: AtomicBool::new(false),
        }
    }

    /// A store with every key in `keys` registered.
    pub fn with_keys<I>(keys: I) -> Result<Self, WardenError>
    where
        I: IntoIterator,
        I::Item: Into<AgentKey>,
    {
        let store = Self::new();
        for k in keys {
            store.register(k.into())?;
        }
        Ok(store)
    }

    // ── Registration ────────────────────────────────────────────

    /// Add `key` with a default-valued slot.
    pub fn register(&self, key: AgentKey) -> Result<(), WardenError> {
        let mut slots = self.slots_mut();
        // Checked under the write lock: `stop` raises the flag before it
        // walks the slots, so a key registered here is either refused or
        // seen (and closed) by that walk.
        if self.is_stopped() {
            return Err(WardenError::StoreStopped);
        }
        if slots.contains_key(&key) {
            return Err(WardenError::AlreadyRegistered(key));
        }
        slots.insert(key, Arc::new(Slot::new()));
        Ok(())
    }

    /// Remove `key`. Waiters blocked on it are released with
    /// [`WardenError::UnknownKey`], as are later operations on it.
    pub fn retire(&self, key: &AgentKey) -> Result<(), WardenError> {
        if self.is_stopped() {
            return Err(WardenError::StoreStopped);
        }
        let slot = self
            .slots_mut()
            .shift_remove(key)
            .ok_or_else(|| WardenError::UnknownKey(key.clone()))?;
        slot.close(Closed::Retired);
        Ok(())
    }

    /// Snapshot of registered keys, in registration order.
    pub fn keys(&self) -> Vec<AgentKey> {
        self.slots_ref().keys().cloned().collect()
    }

    /// Whether `key` is currently registered.
    pub fn contains(&self, key: &AgentKey) -> bool {
        self.slots_ref().contains_key(key)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.slots_ref().len()
    }

    /// Whether no keys are registered.
    pub fn is_empty(&self) -> bool {
        self.slots_ref().is_empty()
    }

    // ── Non-blocking access ─────────────────────────────────────

    /// Current value of `key`.
    pub fn read(&self, key: &AgentKey) -> Result<V, WardenError> {
        self.read_stamped(key).map(|s| s.value)
    }

    /// Current value of `key` with its generation and write instant.
    pub fn read_stamped(&self, key: &AgentKey) -> Result<Stamped<V>, WardenError> {
        let slot = self.slot(key)?;
        let st = slot.lock();
        check_open(st.closed, key)?;
        Ok(Stamped {
            value: st.value.clone(),
            generation: st.generation,
            written_at: st.written_at,
        })
    }

    /// Number of writes to `key` since registration.
    pub fn generation(&self, key: &AgentKey) -> Result<u64, WardenError> {
        let slot = self.slot(key)?;
        let st = slot.lock();
        check_open(st.closed, key)?;
        Ok(st.generation)
    }

    /// Replace `key`'s value and wake its waiters. Returns the new
    /// generation.
    pub fn write(&self, key: &AgentKey, value: V) -> Result<u64, WardenError> {
        let slot = self.slot(key)?;
        let mut st = slot.lock();
        check_open(st.closed, key)?;
        let waiting = st.write(value);
        let generation = st.generation;
        drop(st);
        if waiting {
            slot.changed.notify_all();
        }
        Ok(generation)
    }

    // ── Blocking access ─────────────────────────────────────────

    /// Number of threads currently blocked awaiting `key`.
    pub fn waiters(&self, key: &AgentKey) -> Result<usize, WardenError> {
        let slot = self.slot(key)?;
        let st = slot.lock();
        check_open(st.closed, key)?;
        Ok(st.waiters())
    }

    /// Block until the next write to `key` and return its value.
    pub fn await_next(&self, key: &AgentKey) -> Result<V, WardenError> {
        self.wait(key, None)
    }

    /// As [`await_next`](Self::await_next), failing with
    /// [`WardenError::TimedOut`] if no write lands within `timeout`.
    pub fn await_next_timeout(&self, key: &AgentKey, timeout: Duration) -> Result<V, WardenError> {
        self.wait(key, Some(Instant::now() + timeout))
    }

    fn wait(&self, key: &AgentKey, deadline: Option<Instant>) -> Result<V, WardenError> {
        let slot = self.slot(key)?;
        let mut st = slot.lock();
        check_open(st.closed, key)?;
        let target = st.enter();
        loop {
            match st.poll(target) {
                Poll::Ready(v) => return Ok(v),
                Poll::Closed(c) => return Err(closed_error(c, key)),
                Poll::Waiting => {}
            }
            st = match deadline {
                None => slot
                    .changed
                    .wait(st)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        st.leave(target);
                        return Err(WardenError::TimedOut);
                    }
                    slot.changed
                        .wait_timeout(st, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Stop the store, releasing every blocked waiter with
    /// [`WardenError::StoreStopped`]. Safe to call repeatedly and from
    /// any thread.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let slots: Vec<Arc<Slot<V>>> = self.slots_ref().values().cloned().collect();
        for slot in slots {
            slot.close(Closed::Stopped);
        }
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    // ── Internals ───────────────────────────────────────────────

    fn slot(&self, key: &AgentKey) -> Result<Arc<Slot<V>>, WardenError> {
        if self.is_stopped() {
            return Err(WardenError::StoreStopped);
        }
        self.slots_ref()
            .get(key)
            .cloned()
            .ok_or_else(|| WardenError::UnknownKey(key.clone()))
    }

    fn slots_ref(&self) -> RwLockReadGuard<'_, IndexMap<AgentKey, Arc<Slot<V>>>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn slots_mut(&self) -> RwLockWriteGuard<'_, IndexMap<AgentKey, Arc<Slot<V>>>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check_open(closed: Option<Closed>, key: &AgentKey) -> Result<(), WardenError> {
    match closed {
        None => Ok(()),
        Some(c) => Err(closed_error(c, key)),
    }
}

fn closed_error(closed: Closed, key: &AgentKey) -> WardenError {
    match closed {
        Closed::Stopped => WardenError::StoreStopped,
        Closed::Retired => WardenError::UnknownKey(key.clone()),
    }
}

impl<V> std::fmt::Debug for Warden<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys = self
            .slots
            .read()
            .map(|s| s.len())
            .unwrap_or_else(|e| e.into_inner().len());
        f.debug_struct("Warden")
            .field("keys", &keys)
            .field("stopped", &self.stopped.load(Ordering::SeqCst))
            .finish()
    }
}
