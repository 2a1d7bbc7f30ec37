//! Arbiter: coordination core for multiple autonomous vehicles sharing
//! one airspace.
//!
//! This is the top-level facade crate that re-exports the public API
//! from all Arbiter sub-crates. For most users, adding `arbiter` as a
//! single dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use arbiter::prelude::*;
//!
//! let map = Map::open_box(Vec3::new(-10.0, -10.0, 0.0), Vec3::new(10.0, 10.0, 5.0)).unwrap();
//! let stores = ArbitrationStores {
//!     states: Arc::new(StateStore::with_keys(["uav-1"]).unwrap()),
//!     proposed: Arc::new(TrajectoryStore::with_keys(["uav-1"]).unwrap()),
//!     updated: Arc::new(TrajectoryStore::with_keys(["uav-1"]).unwrap()),
//!     verdicts: Arc::new(VerdictStore::with_keys(["uav-1"]).unwrap()),
//! };
//! let key = AgentKey::new("uav-1");
//! stores.states.write(&key, VehicleState::at_rest(Vec3::new(0.0, 0.0, 1.0))).unwrap();
//!
//! let (mut engine, _dispatch) = ArbitrationEngine::new(
//!     ArbitrationConfig::default(),
//!     Arc::new(map),
//!     Arc::new(SystemClock),
//!     stores.clone(),
//! )
//! .unwrap();
//! engine.cycle_once();
//!
//! // No proposal yet: the vehicle is told to hold where it is.
//! let verdict = stores.verdicts.read(&key).unwrap().unwrap();
//! assert!(!verdict.code.is_success());
//! assert_eq!(stores.updated.read(&key).unwrap().len(), 1);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `arbiter-core` | Keys, geometry, states, trajectories, verdicts, clock |
//! | [`space`] | `arbiter-space` | Maps, convex regions, per-cycle dynamic obstacles |
//! | [`warden`] | `arbiter-warden` | Keyed blocking stores |
//! | [`vetter`] | `arbiter-vetter` | Trajectory legality checks |
//! | [`engine`] | `arbiter-engine` | Arbitration loop, watchdogs, planners, mediator |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types (`arbiter-core`).
///
/// Agent keys, vectors, vehicle states, trajectories, and the
/// [`types::ResultCode`] / [`types::Verdict`] reported to producers.
pub use arbiter_core as types;

/// Static maps and free-space predicates (`arbiter-space`).
pub use arbiter_space as space;

/// Keyed blocking stores (`arbiter-warden`).
///
/// [`warden::Warden`] is the one concurrency primitive every component
/// shares.
pub use arbiter_warden as warden;

/// Trajectory legality checks (`arbiter-vetter`).
pub use arbiter_vetter as vetter;

/// Arbitration engine, watchdogs, planners, and system assembly
/// (`arbiter-engine`).
pub use arbiter_engine as engine;

/// Common imports for typical Arbiter usage.
///
/// ```rust
/// use arbiter::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use arbiter_core::{
        AgentKey, Clock, CycleId, RejectReason, ResultCode, SystemClock, Trajectory,
        TrajectorySample, Vec3, VehicleState, Verdict, Violation, ViolationKind,
    };

    // Errors
    pub use arbiter_core::WardenError;
    pub use arbiter_engine::ConfigError;
    pub use arbiter_space::SpaceError;

    // Space
    pub use arbiter_space::{ConvexRegion, FreeSpace, Map};

    // Stores
    pub use arbiter_warden::{StateStore, TrajectoryStore, VerdictStore, Warden};

    // Vetting
    pub use arbiter_vetter::KinematicLimits;

    // Engine
    pub use arbiter_engine::{
        ArbitrationConfig, ArbitrationEngine, ArbitrationStores, CycleLoop, Dispatch, Mediator,
        MediatorConfig, Planner, PlannerClient, SafetySummary, StatusFlag,
    };
}
