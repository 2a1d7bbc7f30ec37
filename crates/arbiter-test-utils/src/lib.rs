//! Test fixtures for Arbiter development.
//!
//! Provides a [`ManualClock`] for deterministic time, a standard
//! [`arena`] map, and straight-line trajectory builders for
//! constructing arbitration scenarios.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::atomic::{AtomicU64, Ordering};

use arbiter_core::Clock;

pub use fixtures::{arena, arena_with_pillar, crossing_pair, straight_line, T0};

/// A clock that only moves when told to.
///
/// Stores the time as `f64` bits so it can be shared across threads
/// behind an `Arc` and advanced while loops are running.
#[derive(Debug)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(t: f64) -> Self {
        Self {
            bits: AtomicU64::new(t.to_bits()),
        }
    }

    pub fn set(&self, t: f64) {
        self.bits.store(t.to_bits(), Ordering::Release);
    }

    /// Move the clock forward by `dt` seconds.
    pub fn advance(&self, dt: f64) {
        self.set(self.now() + dt);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(T0)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}
