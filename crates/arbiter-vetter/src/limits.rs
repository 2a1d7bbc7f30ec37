//! Kinematic limits applied to every trajectory sample.

/// Per-sample kinematic limits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KinematicLimits {
    /// Maximum declared velocity magnitude (m/s).
    pub max_velocity: f64,
    /// Maximum declared acceleration magnitude (m/s²).
    pub max_acceleration: f64,
    /// Maximum gap between consecutive timestamps (s).
    pub max_sample_interval: f64,
}

impl Default for KinematicLimits {
    fn default() -> Self {
        Self {
            max_velocity: 4.0,
            max_acceleration: 6.0,
            max_sample_interval: 0.2,
        }
    }
}

impl KinematicLimits {
    /// Name and value of the first limit that is not finite and
    /// positive, if any.
    pub fn first_invalid(&self) -> Option<(&'static str, f64)> {
        [
            ("max_velocity", self.max_velocity),
            ("max_acceleration", self.max_acceleration),
            ("max_sample_interval", self.max_sample_interval),
        ]
        .into_iter()
        .find(|(_, v)| !v.is_finite() || *v <= 0.0)
    }
}
