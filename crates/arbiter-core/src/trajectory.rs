//! Time-stamped trajectories.
//!
//! A [`Trajectory`] is an immutable, ordered sequence of
//! [`TrajectorySample`]s. Samples are shared behind an `Arc<[_]>`, so a
//! clone handed out by a store is a cheap value copy that no other thread
//! can mutate.
//!
//! Ordering is NOT enforced at construction: a trajectory with
//! non-increasing timestamps or oversized gaps is representable, and the
//! legality checker reports it as a violation instead of panicking.

use std::sync::Arc;

use crate::geometry::Vec3;

/// One sample of a trajectory: position, velocity, acceleration, yaw,
/// and an absolute timestamp in seconds since the UNIX epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TrajectorySample {
    /// Position (m).
    pub position: Vec3,
    /// Velocity (m/s).
    pub velocity: Vec3,
    /// Acceleration (m/s²).
    pub acceleration: Vec3,
    /// Heading (rad).
    pub yaw: f64,
    /// Absolute time (s since UNIX epoch).
    pub time: f64,
}

impl TrajectorySample {
    /// Construct a sample from its parts.
    pub fn new(position: Vec3, velocity: Vec3, acceleration: Vec3, yaw: f64, time: f64) -> Self {
        Self {
            position,
            velocity,
            acceleration,
            yaw,
            time,
        }
    }

    /// Same position, yaw, and time with zero velocity and acceleration.
    pub fn at_rest(self) -> Self {
        Self {
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            ..self
        }
    }
}

/// An ordered, time-stamped sequence of samples.
///
/// The empty trajectory is the "no proposal" value that freshly
/// registered store slots hold.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trajectory {
    samples: Arc<[TrajectorySample]>,
}

impl Trajectory {
    /// Build a trajectory from samples, kept in the given order.
    pub fn new(samples: Vec<TrajectorySample>) -> Self {
        Self {
            samples: samples.into(),
        }
    }

    /// A single-sample trajectory hovering at `position`.
    pub fn hold(position: Vec3, yaw: f64, time: f64) -> Self {
        Self::new(vec![TrajectorySample::new(
            position,
            Vec3::ZERO,
            Vec3::ZERO,
            yaw,
            time,
        )])
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the trajectory has no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// All samples in order.
    pub fn samples(&self) -> &[TrajectorySample] {
        &self.samples
    }

    /// Sample at `index`, if present.
    pub fn sample(&self, index: usize) -> Option<&TrajectorySample> {
        self.samples.get(index)
    }

    /// Timestamp of the first sample.
    pub fn start_time(&self) -> Option<f64> {
        self.samples.first().map(|s| s.time)
    }

    /// Timestamp of the last sample.
    pub fn end_time(&self) -> Option<f64> {
        self.samples.last().map(|s| s.time)
    }

    /// Number of leading samples whose timestamp is strictly before `time`.
    ///
    /// Assumes increasing timestamps; on an unordered trajectory the
    /// result is some split point but not a meaningful one.
    pub fn count_before(&self, time: f64) -> usize {
        self.samples.partition_point(|s| s.time < time)
    }

    /// Index of the sample nearest in time to `time`, clamped to the
    /// first / last sample. Ties resolve to the earlier sample.
    pub fn nearest_index(&self, time: f64) -> Option<usize> {
        if self.samples.is_empty() {
            return None;
        }
        let idx = self.count_before(time);
        if idx == 0 {
            return Some(0);
        }
        if idx == self.samples.len() {
            return Some(idx - 1);
        }
        let before = time - self.samples[idx - 1].time;
        let after = self.samples[idx].time - time;
        Some(if before <= after { idx - 1 } else { idx })
    }

    /// Nearest-neighbour position at `time`. Before the first sample the
    /// vehicle is at the first waypoint; after the last it holds the
    /// final waypoint.
    pub fn position_at(&self, time: f64) -> Option<Vec3> {
        self.nearest_index(time).map(|i| self.samples[i].position)
    }

    /// The first `len` samples, with the final kept sample brought to
    /// rest so the vehicle hovers there. `len == 0` yields the empty
    /// trajectory; `len >= self.len()` keeps every sample.
    pub fn truncated(&self, len: usize) -> Self {
        let len = len.min(self.samples.len());
        if len == 0 {
            return Self::default();
        }
        let mut kept = self.samples[..len].to_vec();
        if let Some(last) = kept.last_mut() {
            *last = last.at_rest();
        }
        Self::new(kept)
    }
}

impl From<Vec<TrajectorySample>> for Trajectory {
    fn from(v: Vec<TrajectorySample>) -> Self {
        Self::new(v)
    }
}

impl FromIterator<TrajectorySample> for Trajectory {
    fn from_iter<I: IntoIterator<Item = TrajectorySample>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize, dt: f64) -> Trajectory {
        (0..n)
            .map(|i| {
                let t = i as f64 * dt;
                TrajectorySample::new(
                    Vec3::new(t, 0.0, 1.0),
                    Vec3::new(1.0, 0.0, 0.0),
                    Vec3::ZERO,
                    0.0,
                    100.0 + t,
                )
            })
            .collect()
    }

    #[test]
    fn empty_trajectory() {
        let t = Trajectory::default();
        assert_eq!(t.len(), 0);
        assert!(t.is_empty());
        assert!(t.start_time().is_none());
        assert!(t.position_at(0.0).is_none());
    }

    #[test]
    fn sample_access() {
        let s = TrajectorySample::new(
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(2.0, 2.0, 2.0),
            Vec3::new(3.0, 3.0, 3.0),
            0.1,
            0.2,
        );
        let t = Trajectory::new(vec![s]);
        let got = t.sample(0).unwrap();
        assert_eq!(got.position, Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(got.velocity, Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(got.acceleration, Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(got.yaw, 0.1);
        assert_eq!(got.time, 0.2);
        assert!(t.sample(1).is_none());
    }

    #[test]
    fn nearest_index_clamps_and_rounds() {
        let t = line(5, 1.0); // times 100..104
        assert_eq!(t.nearest_index(50.0), Some(0));
        assert_eq!(t.nearest_index(200.0), Some(4));
        assert_eq!(t.nearest_index(101.4), Some(1));
        assert_eq!(t.nearest_index(101.6), Some(2));
        // Exact tie goes to the earlier sample.
        assert_eq!(t.nearest_index(101.5), Some(1));
        assert_eq!(t.nearest_index(103.0), Some(3));
    }

    #[test]
    fn position_holds_final_waypoint() {
        let t = line(3, 1.0);
        assert_eq!(t.position_at(500.0), Some(Vec3::new(2.0, 0.0, 1.0)));
    }

    #[test]
    fn count_before_is_strict() {
        let t = line(4, 1.0);
        assert_eq!(t.count_before(100.0), 0);
        assert_eq!(t.count_before(102.0), 2);
        assert_eq!(t.count_before(102.5), 3);
        assert_eq!(t.count_before(1e9), 4);
    }

    #[test]
    fn truncated_brings_last_sample_to_rest() {
        let t = line(5, 1.0);
        let cut = t.truncated(3);
        assert_eq!(cut.len(), 3);
        let last = cut.sample(2).unwrap();
        assert_eq!(last.position, Vec3::new(2.0, 0.0, 1.0));
        assert_eq!(last.velocity, Vec3::ZERO);
        assert_eq!(last.acceleration, Vec3::ZERO);
        // Earlier samples untouched.
        assert_eq!(cut.sample(1), t.sample(1));
        // Original unaffected.
        assert_eq!(t.sample(2).unwrap().velocity, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn truncated_to_zero_is_empty() {
        assert!(line(3, 1.0).truncated(0).is_empty());
        assert_eq!(line(3, 1.0).truncated(10).len(), 3);
    }

    #[test]
    fn hold_is_single_resting_sample() {
        let h = Trajectory::hold(Vec3::new(1.0, 2.0, 3.0), 0.5, 10.0);
        assert_eq!(h.len(), 1);
        assert_eq!(h.sample(0).unwrap().velocity, Vec3::ZERO);
        assert_eq!(h.start_time(), Some(10.0));
    }

    #[test]
    fn clones_share_samples_but_compare_by_value() {
        let a = line(3, 1.0);
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a, line(3, 1.0));
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn nearest_sample_is_never_farther_than_neighbours(
                n in 1usize..40,
                dt in 0.01f64..2.0,
                query in -10.0f64..100.0,
            ) {
                let t = line(n, dt);
                let q = 100.0 + query;
                let idx = t.nearest_index(q).unwrap();
                prop_assert!(idx < n);
                let best = (t.samples()[idx].time - q).abs();
                for s in t.samples() {
                    prop_assert!(best <= (s.time - q).abs() + 1e-9);
                }
            }

            #[test]
            fn truncation_keeps_prefix(n in 1usize..30, keep in 0usize..40) {
                let t = line(n, 0.1);
                let cut = t.truncated(keep);
                prop_assert_eq!(cut.len(), keep.min(n));
                for i in 0..cut.len().saturating_sub(1) {
                    prop_assert_eq!(cut.sample(i), t.sample(i));
                }
            }
        }
    }
}
