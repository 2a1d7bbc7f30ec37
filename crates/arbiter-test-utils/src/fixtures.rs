//! Reusable maps and trajectories.
//!
//! - [`arena`]: obstacle-free box, 40 m x 40 m x 10 m, centred on the
//!   origin in x and y with the floor at z = 0.
//! - [`arena_with_pillar`]: the same box with a 2 m square pillar at
//!   the origin spanning the full height.
//! - [`straight_line`]: constant-velocity trajectory.
//! - [`crossing_pair`]: two vehicles flying head-on along the x axis.

use arbiter_core::{Trajectory, TrajectorySample, Vec3};
use arbiter_space::{ConvexRegion, Map};

/// A fixed epoch-like start time for scenarios.
pub const T0: f64 = 1_700_000_000.0;

pub fn arena() -> Map {
    match Map::open_box(Vec3::new(-20.0, -20.0, 0.0), Vec3::new(20.0, 20.0, 10.0)) {
        Ok(m) => m,
        Err(e) => panic!("arena fixture: {e}"),
    }
}

pub fn arena_with_pillar() -> Map {
    match ConvexRegion::aabb(Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 10.0)) {
        Ok(pillar) => arena().with_obstacle(pillar),
        Err(e) => panic!("pillar fixture: {e}"),
    }
}

/// `n` samples from `start` at constant `velocity`, `dt` apart from `t0`.
///
/// Acceleration is zero; yaw follows the direction of travel.
pub fn straight_line(start: Vec3, velocity: Vec3, t0: f64, dt: f64, n: usize) -> Trajectory {
    let yaw = velocity.y.atan2(velocity.x);
    (0..n)
        .map(|i| {
            let t = i as f64 * dt;
            TrajectorySample::new(start + velocity * t, velocity, Vec3::ZERO, yaw, t0 + t)
        })
        .collect()
}

/// Two vehicles 10 m apart at z = 1 flying towards each other at
/// `speed` for 10 s, sampled every 0.1 s.
pub fn crossing_pair(t0: f64, speed: f64) -> (Trajectory, Trajectory) {
    (
        straight_line(Vec3::new(-5.0, 0.0, 1.0), Vec3::new(speed, 0.0, 0.0), t0, 0.1, 101),
        straight_line(Vec3::new(5.0, 0.0, 1.0), Vec3::new(-speed, 0.0, 0.0), t0, 0.1, 101),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_space::FreeSpace;

    #[test]
    fn arena_bounds() {
        let map = arena();
        assert!(map.is_free_space(Vec3::new(0.0, 0.0, 1.0)));
        assert!(!map.is_free_space(Vec3::new(25.0, 0.0, 1.0)));
        assert!(!arena_with_pillar().is_free_space(Vec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn straight_line_spacing() {
        let t = straight_line(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), 5.0, 0.5, 3);
        assert_eq!(t.len(), 3);
        assert_eq!(t.sample(2).unwrap().position, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(t.end_time(), Some(6.0));
    }

    #[test]
    fn crossing_pair_meets_in_the_middle() {
        let (a, b) = crossing_pair(0.0, 1.0);
        let pa = a.position_at(5.0).unwrap();
        let pb = b.position_at(5.0).unwrap();
        assert!(pa.distance(pb) < 1e-9);
    }
}
