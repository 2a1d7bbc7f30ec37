//! Static maps, convex regions, and per-cycle dynamic obstacles.
//!
//! The arena is a convex boundary plus a set of convex static
//! obstacles ([`Map`]). The legality checker and the state watchdog only
//! need the free-space predicate, abstracted as [`FreeSpace`] so that a
//! richer geometry backend can be substituted. The arbitration engine
//! additionally builds a [`CycleMap`] each cycle, layering every agent's
//! safety bubble over the static map.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod dynamic;
pub mod error;
pub mod map;
pub mod region;

pub use dynamic::CycleMap;
pub use error::SpaceError;
pub use map::{FreeSpace, Map};
pub use region::{Aabb, ConvexRegion, Plane, Polytope};
