//! Trajectory legality checking ("vetting").
//!
//! [`check`] is a pure function applied twice in the system: by
//! planners before submission (advisory) and by the arbitration engine
//! every cycle (authoritative). Both use the same code so that a
//! planner that self-vets never gets surprised.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod limits;
pub mod vetter;

pub use limits::KinematicLimits;
pub use vetter::{check, violations};
