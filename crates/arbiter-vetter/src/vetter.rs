//! The legality checker.
//!
//! Samples are walked in order. At each sample the tests run in a
//! fixed order:
//!
//! 1. [`NonMonotonicTime`](ViolationKind::NonMonotonicTime): timestamp
//!    not strictly after the previous one (value: the timestamp).
//! 2. [`TimeBetweenSamplesExceedsMax`](ViolationKind::TimeBetweenSamplesExceedsMax):
//!    gap to the previous timestamp (value: the gap).
//! 3. [`MaxVelocityExceeded`](ViolationKind::MaxVelocityExceeded):
//!    declared velocity norm (value: the norm).
//! 4. [`MaxAccelerationExceeded`](ViolationKind::MaxAccelerationExceeded):
//!    declared acceleration norm (value: the norm).
//! 5. [`SampleOutsideFreeSpace`](ViolationKind::SampleOutsideFreeSpace)
//!    (value: the sample's timestamp).
//!
//! Comparisons are written so that NaN always fails.

use arbiter_core::{Trajectory, TrajectorySample, Violation, ViolationKind, Violations};
use arbiter_space::FreeSpace;

use crate::limits::KinematicLimits;

/// Number of checker categories.
const CATEGORIES: usize = 5;

/// First violation in the trajectory, lowest sample index first and
/// fixed test order within a sample. The empty trajectory is legal.
pub fn check<F: FreeSpace + ?Sized>(
    trajectory: &Trajectory,
    free_space: &F,
    limits: &KinematicLimits,
) -> Result<(), Violation> {
    let mut prev: Option<&TrajectorySample> = None;
    for (index, sample) in trajectory.samples().iter().enumerate() {
        if let Some(v) = sample_violations(index, sample, prev, free_space, limits).next() {
            return Err(v);
        }
        prev = Some(sample);
    }
    Ok(())
}

/// The first violation of each category, in category order.
///
/// Where [`check`] stops at the first failure, this keeps scanning so a
/// planner can fix every kind of problem in one round trip.
pub fn violations<F: FreeSpace + ?Sized>(
    trajectory: &Trajectory,
    free_space: &F,
    limits: &KinematicLimits,
) -> Violations {
    let mut first: [Option<Violation>; CATEGORIES] = Default::default();
    let mut prev: Option<&TrajectorySample> = None;
    for (index, sample) in trajectory.samples().iter().enumerate() {
        for v in sample_violations(index, sample, prev, free_space, limits) {
            let slot = &mut first[category(&v.kind)];
            if slot.is_none() {
                *slot = Some(v);
            }
        }
        if first.iter().all(Option::is_some) {
            break;
        }
        prev = Some(sample);
    }
    first.into_iter().flatten().collect()
}

fn category(kind: &ViolationKind) -> usize {
    match kind {
        ViolationKind::NonMonotonicTime => 0,
        ViolationKind::TimeBetweenSamplesExceedsMax => 1,
        ViolationKind::MaxVelocityExceeded => 2,
        ViolationKind::MaxAccelerationExceeded => 3,
        // The checker never emits separation violations.
        ViolationKind::SampleOutsideFreeSpace | ViolationKind::MinimumSeparation { .. } => 4,
    }
}

fn sample_violations<'a, F: FreeSpace + ?Sized>(
    index: usize,
    sample: &'a TrajectorySample,
    prev: Option<&'a TrajectorySample>,
    free_space: &'a F,
    limits: &'a KinematicLimits,
) -> impl Iterator<Item = Violation> + 'a {
    let timing = prev.into_iter().flat_map(move |p| {
        let gap = sample.time - p.time;
        let non_monotonic = (!(sample.time > p.time))
            .then(|| Violation::new(ViolationKind::NonMonotonicTime, sample.time, index));
        // A non-increasing step has no meaningful gap to report.
        let too_sparse = (sample.time > p.time && !(gap <= limits.max_sample_interval))
            .then(|| Violation::new(ViolationKind::TimeBetweenSamplesExceedsMax, gap, index));
        non_monotonic.into_iter().chain(too_sparse)
    });

    let speed = sample.velocity.norm();
    let velocity = (!(speed <= limits.max_velocity))
        .then(|| Violation::new(ViolationKind::MaxVelocityExceeded, speed, index));

    let accel = sample.acceleration.norm();
    let acceleration = (!(accel <= limits.max_acceleration))
        .then(|| Violation::new(ViolationKind::MaxAccelerationExceeded, accel, index));

    let outside = (!free_space.is_free_space(sample.position))
        .then(|| Violation::new(ViolationKind::SampleOutsideFreeSpace, sample.time, index));

    timing
        .chain(velocity)
        .chain(acceleration)
        .chain(outside)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_core::Vec3;
    use arbiter_space::{ConvexRegion, Map};

    fn arena() -> Map {
        Map::open_box(Vec3::new(-10.0, -10.0, 0.0), Vec3::new(10.0, 10.0, 5.0))
            .unwrap()
            .with_obstacle(ConvexRegion::ball(Vec3::new(5.0, 0.0, 1.0), 0.5).unwrap())
    }

    /// 1 m/s along +x at z = 1, 0.1 s steps.
    fn line(n: usize) -> Vec<TrajectorySample> {
        (0..n)
            .map(|i| {
                let t = i as f64 * 0.1;
                TrajectorySample::new(
                    Vec3::new(t, 0.0, 1.0),
                    Vec3::new(1.0, 0.0, 0.0),
                    Vec3::ZERO,
                    0.0,
                    1000.0 + t,
                )
            })
            .collect()
    }

    fn run(samples: Vec<TrajectorySample>) -> Result<(), Violation> {
        check(&Trajectory::new(samples), &arena(), &KinematicLimits::default())
    }

    #[test]
    fn legal_trajectory_passes() {
        assert_eq!(run(line(20)), Ok(()));
    }

    #[test]
    fn empty_trajectory_is_legal() {
        assert_eq!(run(Vec::new()), Ok(()));
        let none = violations(&Trajectory::default(), &arena(), &KinematicLimits::default());
        assert!(none.is_empty());
    }

    #[test]
    fn velocity_violation_reports_index_and_value() {
        let mut s = line(10);
        s[4].velocity = Vec3::new(3.0, 4.0, 0.0) * 1.2;
        let v = run(s).unwrap_err();
        assert_eq!(v.kind, ViolationKind::MaxVelocityExceeded);
        assert_eq!(v.index, 4);
        assert!((v.value - 6.0).abs() < 1e-12);
    }

    #[test]
    fn first_violation_wins() {
        let mut s = line(10);
        s[7].acceleration = Vec3::new(10.0, 0.0, 0.0);
        s[3].velocity = Vec3::new(9.0, 0.0, 0.0);
        let v = run(s).unwrap_err();
        assert_eq!(v.kind, ViolationKind::MaxVelocityExceeded);
        assert_eq!(v.index, 3);
    }

    #[test]
    fn order_within_a_sample() {
        let mut s = line(5);
        // Sample 2 fails velocity, acceleration, and free space at once.
        s[2].velocity = Vec3::new(9.0, 0.0, 0.0);
        s[2].acceleration = Vec3::new(9.0, 0.0, 0.0);
        s[2].position = Vec3::new(50.0, 0.0, 1.0);
        assert_eq!(run(s.clone()).unwrap_err().kind, ViolationKind::MaxVelocityExceeded);
        s[2].velocity = Vec3::ZERO;
        assert_eq!(run(s.clone()).unwrap_err().kind, ViolationKind::MaxAccelerationExceeded);
        s[2].acceleration = Vec3::ZERO;
        assert_eq!(run(s).unwrap_err().kind, ViolationKind::SampleOutsideFreeSpace);
    }

    #[test]
    fn non_monotonic_time() {
        let mut s = line(6);
        s[3].time = s[2].time;
        let v = run(s).unwrap_err();
        assert_eq!(v.kind, ViolationKind::NonMonotonicTime);
        assert_eq!(v.index, 3);
    }

    #[test]
    fn nan_time_is_non_monotonic() {
        let mut s = line(4);
        s[1].time = f64::NAN;
        assert_eq!(run(s).unwrap_err().kind, ViolationKind::NonMonotonicTime);
    }

    #[test]
    fn sparse_samples() {
        let mut s = line(6);
        for sample in &mut s[4..] {
            sample.time += 0.5;
        }
        let v = run(s).unwrap_err();
        assert_eq!(v.kind, ViolationKind::TimeBetweenSamplesExceedsMax);
        assert_eq!(v.index, 4);
        assert!((v.value - 0.6).abs() < 1e-9);
    }

    #[test]
    fn sample_in_obstacle() {
        let mut s = line(10);
        s[6].position = Vec3::new(5.0, 0.1, 1.0);
        let v = run(s).unwrap_err();
        assert_eq!(v.kind, ViolationKind::SampleOutsideFreeSpace);
        assert_eq!(v.index, 6);
    }

    #[test]
    fn violations_keeps_first_of_each_category() {
        let mut s = line(12);
        s[2].velocity = Vec3::new(9.0, 0.0, 0.0);
        s[5].velocity = Vec3::new(9.0, 0.0, 0.0);
        s[8].position = Vec3::new(0.0, 0.0, -1.0);
        s[9].acceleration = Vec3::new(0.0, 0.0, 7.0);
        let all = violations(&Trajectory::new(s), &arena(), &KinematicLimits::default());
        let got: Vec<_> = all.iter().map(|v| (v.kind.clone(), v.index)).collect();
        assert_eq!(
            got,
            vec![
                (ViolationKind::MaxVelocityExceeded, 2),
                (ViolationKind::MaxAccelerationExceeded, 9),
                (ViolationKind::SampleOutsideFreeSpace, 8),
            ]
        );
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn check_agrees_with_earliest_violation(
                bad in prop::collection::vec((0usize..30, 0u8..3), 0..6),
            ) {
                let mut s = line(30);
                for (i, what) in &bad {
                    match what {
                        0 => s[*i].velocity = Vec3::new(0.0, 5.0, 0.0),
                        1 => s[*i].acceleration = Vec3::new(0.0, 0.0, 8.0),
                        _ => s[*i].position = Vec3::new(0.0, 0.0, 9.0),
                    }
                }
                let t = Trajectory::new(s);
                let limits = KinematicLimits::default();
                let all = violations(&t, &arena(), &limits);
                match check(&t, &arena(), &limits) {
                    Ok(()) => prop_assert!(bad.is_empty() && all.is_empty()),
                    Err(v) => {
                        let min = bad.iter().map(|(i, _)| *i).min().unwrap();
                        prop_assert_eq!(v.index, min);
                        prop_assert!(all.iter().all(|w| w.index >= v.index));
                        prop_assert!(all.contains(&v));
                    }
                }
            }
        }
    }
}
