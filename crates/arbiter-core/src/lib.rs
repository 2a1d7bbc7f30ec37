//! Core types for the Arbiter multi-vehicle arbitration framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the value types shared by every other crate in the workspace: agent
//! keys, kinematic state, trajectories, arbitration outcomes, the store
//! error taxonomy, and the wall-clock abstraction.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod error;
pub mod geometry;
pub mod id;
pub mod outcome;
pub mod state;
pub mod trajectory;

pub use clock::{Clock, SystemClock};
pub use error::WardenError;
pub use geometry::{Quaternion, Vec3};
pub use id::{AgentKey, CycleId};
pub use outcome::{RejectReason, ResultCode, Verdict, Violation, ViolationKind, Violations};
pub use state::VehicleState;
pub use trajectory::{Trajectory, TrajectorySample};
