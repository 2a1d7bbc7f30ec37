//! Forward projection of trajectory pairs and truncate-and-hold cuts.
//!
//! Positions are sampled nearest-neighbour, clamped to the first and
//! last sample, at the horizon start and at every sample timestamp at
//! or after it. A finished trajectory therefore holds its last waypoint
//! for the rest of the horizon.

use arbiter_core::{Trajectory, Vec3};
use arbiter_space::ConvexRegion;
use smallvec::SmallVec;

/// A predicted separation breach.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Breach {
    /// First evaluated time at which the separation is too small.
    pub time: f64,
    /// Separation at that time (m).
    pub distance: f64,
}

/// Evaluation times: `from`, then every timestamp of either trajectory
/// at or after it, ascending and deduplicated.
fn evaluation_times(a: &Trajectory, b: Option<&Trajectory>, from: f64) -> Vec<f64> {
    let sources: SmallVec<[&Trajectory; 2]> = std::iter::once(a).chain(b).collect();
    let mut times: Vec<f64> = std::iter::once(from)
        .chain(
            sources
                .iter()
                .flat_map(|t| t.samples().iter().map(|s| s.time))
                .filter(|t| *t >= from),
        )
        .collect();
    times.sort_by(f64::total_cmp);
    times.dedup();
    times
}

/// First time at or after `from` at which two moving trajectories come
/// closer than `min_separation`.
pub fn moving_breach(
    a: &Trajectory,
    b: &Trajectory,
    from: f64,
    min_separation: f64,
) -> Option<Breach> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    evaluation_times(a, Some(b), from)
        .into_iter()
        .find_map(|time| {
            let pa = a.position_at(time)?;
            let pb = b.position_at(time)?;
            let distance = pa.distance(pb);
            (distance < min_separation).then_some(Breach { time, distance })
        })
}

/// First time at or after `from` at which a moving trajectory enters
/// the interior of a holding agent's bubble.
pub fn holding_breach(moving: &Trajectory, bubble: &ConvexRegion, from: f64) -> Option<Breach> {
    if moving.is_empty() {
        return None;
    }
    evaluation_times(moving, None, from)
        .into_iter()
        .find_map(|time| {
            let p = moving.position_at(time)?;
            bubble.contains_strictly(p).then(|| Breach {
                time,
                distance: clearance(bubble, p),
            })
        })
}

/// Distance from `p` to the bubble's centre; zero for non-ball regions.
fn clearance(bubble: &ConvexRegion, p: Vec3) -> f64 {
    match bubble {
        ConvexRegion::Ball { center, .. } => p.distance(*center),
        ConvexRegion::Polytope(_) => 0.0,
    }
}

/// Truncate-and-hold cut for a breach at `time`: keep the samples
/// strictly before `time`, but always drop at least one sample so that
/// repeated cuts make progress. The last kept sample is brought to
/// rest. Cutting a single-sample trajectory yields the empty one.
pub fn cut_before(trajectory: &Trajectory, time: f64) -> Trajectory {
    let keep = trajectory
        .count_before(time)
        .min(trajectory.len().saturating_sub(1));
    trajectory.truncated(keep)
}
