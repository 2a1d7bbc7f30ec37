//! Keyed blocking stores ("wardens").
//!
//! A [`Warden`] maps agent keys to value slots and is the single
//! synchronization point between loops running at independent rates:
//! producers [`write`](Warden::write), snapshot consumers
//! [`read`](Warden::read), and event-driven consumers block in
//! [`await_next`](Warden::await_next) until the next write lands.
//!
//! Every key owns its own mutex, condition variable, and generation
//! counter, so a waiter blocked on one agent never delays another.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod slot;
pub mod warden;

pub use warden::{Stamped, Warden};

use arbiter_core::{Trajectory, VehicleState, Verdict};

/// Latest known kinematic state per vehicle.
pub type StateStore = Warden<VehicleState>;

/// Proposed or updated trajectory per vehicle. The empty trajectory
/// means "nothing written yet".
pub type TrajectoryStore = Warden<Trajectory>;

/// Latest arbitration verdict per vehicle.
pub type VerdictStore = Warden<Option<Verdict>>;
