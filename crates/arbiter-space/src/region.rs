//! Convex regions: half-space polytopes and balls.

use arbiter_core::Vec3;
use smallvec::SmallVec;

use crate::error::SpaceError;

/// An oriented plane `normal · p = offset` with a unit outward normal.
///
/// A point is on the inner side when `normal · p <= offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    normal: Vec3,
    offset: f64,
}

impl Plane {
    /// Build a plane from any non-zero outward normal. The normal is
    /// rescaled to unit length and the offset with it.
    pub fn new(normal: Vec3, offset: f64) -> Result<Self, SpaceError> {
        if !normal.is_finite() || !offset.is_finite() {
            return Err(SpaceError::DegeneratePlane);
        }
        let n = normal.norm();
        let unit = normal.normalized().ok_or(SpaceError::DegeneratePlane)?;
        Ok(Self {
            normal: unit,
            offset: offset / n,
        })
    }

    /// Unit outward normal.
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Offset along the normal.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Signed distance from `p`: negative inside, positive outside.
    pub fn signed_distance(&self, p: Vec3) -> f64 {
        self.normal.dot(p) - self.offset
    }

    /// The plane pushed outward by `d` (inward for negative `d`).
    pub fn shifted(&self, d: f64) -> Self {
        Self {
            normal: self.normal,
            offset: self.offset + d,
        }
    }
}

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Whether `min <= max` on every axis.
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Whether `p` lies inside or on the box.
    pub fn contains(&self, p: Vec3) -> bool {
        (self.min.x..=self.max.x).contains(&p.x)
            && (self.min.y..=self.max.y).contains(&p.y)
            && (self.min.z..=self.max.z).contains(&p.z)
    }

    /// `(min, max)` pairs for the x, y, and z axes.
    pub fn extents(&self) -> [(f64, f64); 3] {
        [
            (self.min.x, self.max.x),
            (self.min.y, self.max.y),
            (self.min.z, self.max.z),
        ]
    }
}

/// Intersection of half-spaces. Six planes cover the common box case
/// without a heap allocation.
#[derive(Clone, Debug, PartialEq)]
pub struct Polytope {
    planes: SmallVec<[Plane; 6]>,
}

impl Polytope {
    /// Polytope bounded by the given planes. No planes means all of space.
    pub fn new(planes: impl IntoIterator<Item = Plane>) -> Self {
        Self {
            planes: planes.into_iter().collect(),
        }
    }

    /// Axis-aligned box with corners `min` and `max`.
    pub fn aabb(min: Vec3, max: Vec3) -> Result<Self, SpaceError> {
        let bounds = Aabb { min, max };
        if !min.is_finite() || !max.is_finite() || !bounds.is_valid() {
            return Err(SpaceError::InvertedBounds);
        }
        let planes = [
            Plane::new(Vec3::new(1.0, 0.0, 0.0), max.x)?,
            Plane::new(Vec3::new(-1.0, 0.0, 0.0), -min.x)?,
            Plane::new(Vec3::new(0.0, 1.0, 0.0), max.y)?,
            Plane::new(Vec3::new(0.0, -1.0, 0.0), -min.y)?,
            Plane::new(Vec3::new(0.0, 0.0, 1.0), max.z)?,
            Plane::new(Vec3::new(0.0, 0.0, -1.0), -min.z)?,
        ];
        Ok(Self::new(planes))
    }

    /// The bounding planes.
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Whether `p` is on the inner side of every plane.
    pub fn contains(&self, p: Vec3) -> bool {
        self.planes.iter().all(|pl| pl.signed_distance(p) <= 0.0)
    }

    /// Every face moved outward by `d` (inward for negative `d`).
    pub fn offset(&self, d: f64) -> Self {
        Self::new(self.planes.iter().map(|pl| pl.shifted(d)))
    }

    /// Box spanned by the axis-aligned faces, or `None` if some axis is
    /// unbounded by an axis-aligned face. The polytope always lies
    /// inside this box, though the box may be loose when slanted faces
    /// cut it further.
    pub fn bounding_box(&self) -> Option<Aabb> {
        let mut lo = [f64::NEG_INFINITY; 3];
        let mut hi = [f64::INFINITY; 3];
        for pl in &self.planes {
            let n = pl.normal();
            let axes = [n.x, n.y, n.z];
            for (axis, &c) in axes.iter().enumerate() {
                let others_zero = axes
                    .iter()
                    .enumerate()
                    .all(|(j, &v)| j == axis || v == 0.0);
                if !others_zero {
                    continue;
                }
                if c == 1.0 {
                    hi[axis] = hi[axis].min(pl.offset());
                } else if c == -1.0 {
                    lo[axis] = lo[axis].max(-pl.offset());
                }
            }
        }
        if lo.iter().chain(hi.iter()).any(|v| !v.is_finite()) {
            return None;
        }
        Some(Aabb {
            min: Vec3::new(lo[0], lo[1], lo[2]),
            max: Vec3::new(hi[0], hi[1], hi[2]),
        })
    }
}

/// A convex region of the arena.
#[derive(Clone, Debug, PartialEq)]
pub enum ConvexRegion {
    /// Intersection of half-spaces.
    Polytope(Polytope),
    /// Closed ball.
    Ball {
        /// Centre.
        center: Vec3,
        /// Radius (m), `>= 0`.
        radius: f64,
    },
}

impl ConvexRegion {
    /// Axis-aligned box region.
    pub fn aabb(min: Vec3, max: Vec3) -> Result<Self, SpaceError> {
        Polytope::aabb(min, max).map(Self::Polytope)
    }

    /// Ball region.
    pub fn ball(center: Vec3, radius: f64) -> Result<Self, SpaceError> {
        if !radius.is_finite() || radius < 0.0 || !center.is_finite() {
            return Err(SpaceError::InvalidRadius { value: radius });
        }
        Ok(Self::Ball { center, radius })
    }

    /// Whether `p` lies inside or on the region.
    pub fn contains(&self, p: Vec3) -> bool {
        match self {
            Self::Polytope(poly) => poly.contains(p),
            Self::Ball { center, radius } => center.distance(p) <= *radius,
        }
    }

    /// Whether `p` lies strictly inside the region.
    pub fn contains_strictly(&self, p: Vec3) -> bool {
        match self {
            Self::Polytope(poly) => poly.planes().iter().all(|pl| pl.signed_distance(p) < 0.0),
            Self::Ball { center, radius } => center.distance(p) < *radius,
        }
    }

    /// The region grown by `d` on every side.
    pub fn inflated(&self, d: f64) -> Result<Self, SpaceError> {
        check_distance(d)?;
        Ok(match self {
            Self::Polytope(poly) => Self::Polytope(poly.offset(d)),
            Self::Ball { center, radius } => Self::Ball {
                center: *center,
                radius: radius + d,
            },
        })
    }

    /// The region shrunk by `d` on every side.
    ///
    /// Fails with [`SpaceError::EmptyRegion`] when a ball's radius or a
    /// box's extent would go negative.
    pub fn shrunk(&self, d: f64) -> Result<Self, SpaceError> {
        check_distance(d)?;
        match self {
            Self::Polytope(poly) => {
                let shrunk = poly.offset(-d);
                if let Some(bounds) = shrunk.bounding_box() {
                    if !bounds.is_valid() {
                        return Err(SpaceError::EmptyRegion);
                    }
                }
                Ok(Self::Polytope(shrunk))
            }
            Self::Ball { center, radius } => {
                if *radius < d {
                    return Err(SpaceError::EmptyRegion);
                }
                Ok(Self::Ball {
                    center: *center,
                    radius: radius - d,
                })
            }
        }
    }

    /// Axis-aligned bounds, when they can be derived.
    pub fn bounding_box(&self) -> Option<Aabb> {
        match self {
            Self::Polytope(poly) => poly.bounding_box(),
            Self::Ball { center, radius } => {
                let r = Vec3::new(*radius, *radius, *radius);
                Some(Aabb {
                    min: *center - r,
                    max: *center + r,
                })
            }
        }
    }
}

fn check_distance(d: f64) -> Result<(), SpaceError> {
    if !d.is_finite() || d < 0.0 {
        return Err(SpaceError::InvalidDistance { value: d });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> ConvexRegion {
        ConvexRegion::aabb(Vec3::ZERO, Vec3::new(1.0, 1.0, 1.0)).unwrap()
    }

    #[test]
    fn plane_normalises() {
        let p = Plane::new(Vec3::new(0.0, 0.0, 2.0), 4.0).unwrap();
        assert_eq!(p.normal(), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(p.offset(), 2.0);
        assert!(p.signed_distance(Vec3::new(0.0, 0.0, 1.0)) < 0.0);
        assert!(p.signed_distance(Vec3::new(0.0, 0.0, 3.0)) > 0.0);
    }

    #[test]
    fn degenerate_plane_rejected() {
        assert_eq!(Plane::new(Vec3::ZERO, 1.0), Err(SpaceError::DegeneratePlane));
        assert_eq!(
            Plane::new(Vec3::new(f64::NAN, 0.0, 0.0), 1.0),
            Err(SpaceError::DegeneratePlane)
        );
    }

    #[test]
    fn box_contains() {
        let b = unit_box();
        assert!(b.contains(Vec3::new(0.5, 0.5, 0.5)));
        assert!(b.contains(Vec3::new(1.0, 1.0, 1.0)));
        assert!(!b.contains_strictly(Vec3::new(1.0, 1.0, 1.0)));
        assert!(!b.contains(Vec3::new(1.1, 0.5, 0.5)));
        assert!(!b.contains(Vec3::new(0.5, -0.1, 0.5)));
    }

    #[test]
    fn inverted_box_rejected() {
        assert_eq!(
            ConvexRegion::aabb(Vec3::new(1.0, 0.0, 0.0), Vec3::ZERO),
            Err(SpaceError::InvertedBounds)
        );
    }

    #[test]
    fn box_inflate_and_shrink() {
        let b = unit_box();
        let grown = b.inflated(0.5).unwrap();
        assert!(grown.contains(Vec3::new(1.4, 0.5, 0.5)));
        let bounds = grown.bounding_box().unwrap();
        assert_eq!(bounds.min, Vec3::new(-0.5, -0.5, -0.5));
        assert_eq!(bounds.max, Vec3::new(1.5, 1.5, 1.5));

        let shrunk = b.shrunk(0.25).unwrap();
        assert!(!shrunk.contains(Vec3::new(0.1, 0.5, 0.5)));
        assert!(shrunk.contains(Vec3::new(0.5, 0.5, 0.5)));

        assert_eq!(b.shrunk(0.6), Err(SpaceError::EmptyRegion));
    }

    #[test]
    fn ball_contains_and_inflates() {
        let ball = ConvexRegion::ball(Vec3::ZERO, 1.0).unwrap();
        assert!(ball.contains(Vec3::new(1.0, 0.0, 0.0)));
        assert!(!ball.contains_strictly(Vec3::new(1.0, 0.0, 0.0)));
        assert!(!ball.contains(Vec3::new(0.8, 0.8, 0.0)));
        assert!(ball.inflated(0.2).unwrap().contains(Vec3::new(0.8, 0.8, 0.0)));
        assert_eq!(ball.shrunk(2.0), Err(SpaceError::EmptyRegion));
    }

    #[test]
    fn negative_distances_rejected() {
        let b = unit_box();
        assert_eq!(b.inflated(-1.0), Err(SpaceError::InvalidDistance { value: -1.0 }));
        assert!(ConvexRegion::ball(Vec3::ZERO, -0.1).is_err());
        assert!(ConvexRegion::ball(Vec3::ZERO, f64::INFINITY).is_err());
    }

    #[test]
    fn slanted_polytope_has_no_box_on_open_axes() {
        let half = Polytope::new([Plane::new(Vec3::new(1.0, 1.0, 0.0), 1.0).unwrap()]);
        assert!(half.bounding_box().is_none());
        assert!(half.contains(Vec3::ZERO));
        assert!(!half.contains(Vec3::new(1.0, 1.0, 0.0)));
    }

    #[test]
    fn empty_polytope_is_everything() {
        let all = Polytope::new([]);
        assert!(all.contains(Vec3::new(1e9, -1e9, 0.0)));
    }
}
