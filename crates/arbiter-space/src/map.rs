//! The static arena: a convex boundary plus convex static obstacles.

use arbiter_core::Vec3;

use crate::error::SpaceError;
use crate::region::{Aabb, ConvexRegion};

/// Free-space predicate consumed by the legality checker and the state
/// watchdog.
///
/// Implemented by [`Map`] and by [`CycleMap`](crate::CycleMap); any
/// other geometry backend can plug in by implementing it.
pub trait FreeSpace {
    /// Whether `p` lies inside the arena boundary.
    fn contains(&self, p: Vec3) -> bool;

    /// Whether `p` is inside the boundary and outside every obstacle.
    fn is_free_space(&self, p: Vec3) -> bool;
}

impl<F: FreeSpace + ?Sized> FreeSpace for &F {
    fn contains(&self, p: Vec3) -> bool {
        (**self).contains(p)
    }

    fn is_free_space(&self, p: Vec3) -> bool {
        (**self).is_free_space(p)
    }
}

/// Immutable static map.
///
/// Obstacles are closed sets: a point on an obstacle's surface is not
/// free. The boundary is closed too, so a point on it is inside.
#[derive(Clone, Debug, PartialEq)]
pub struct Map {
    boundary: ConvexRegion,
    obstacles: Vec<ConvexRegion>,
}

impl Map {
    /// Map with the given boundary and obstacles.
    pub fn new(boundary: ConvexRegion, obstacles: Vec<ConvexRegion>) -> Self {
        Self {
            boundary,
            obstacles,
        }
    }

    /// Obstacle-free axis-aligned box arena.
    pub fn open_box(min: Vec3, max: Vec3) -> Result<Self, SpaceError> {
        Ok(Self::new(ConvexRegion::aabb(min, max)?, Vec::new()))
    }

    /// Builder-style obstacle addition.
    pub fn with_obstacle(mut self, obstacle: ConvexRegion) -> Self {
        self.obstacles.push(obstacle);
        self
    }

    /// The arena boundary.
    pub fn boundary(&self) -> &ConvexRegion {
        &self.boundary
    }

    /// The static obstacles.
    pub fn obstacles(&self) -> &[ConvexRegion] {
        &self.obstacles
    }

    /// Axis-aligned extents of the boundary, if bounded on every axis.
    pub fn extents(&self) -> Option<Aabb> {
        self.boundary.bounding_box()
    }

    /// A copy with the boundary shrunk and every obstacle grown by `d`.
    ///
    /// Used to bake a vehicle radius into the map so that point checks
    /// against the inflated map are clearance checks against the
    /// original.
    pub fn inflate(&self, d: f64) -> Result<Self, SpaceError> {
        let boundary = self.boundary.shrunk(d)?;
        let obstacles = self
            .obstacles
            .iter()
            .map(|o| o.inflated(d))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            boundary,
            obstacles,
        })
    }
}

impl FreeSpace for Map {
    fn contains(&self, p: Vec3) -> bool {
        self.boundary.contains(p)
    }

    fn is_free_space(&self, p: Vec3) -> bool {
        p.is_finite() && self.contains(p) && !self.obstacles.iter().any(|o| o.contains(p))
    }
}
