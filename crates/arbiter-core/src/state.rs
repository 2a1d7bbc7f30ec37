//! Vehicle kinematic state as produced by each vehicle's estimator.

use crate::geometry::{Quaternion, Vec3};

/// Latest known kinematic state of one vehicle.
///
/// Written only by the state-ingestion path; the arbitration engine and
/// the watchdogs read copies and never mutate it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VehicleState {
    /// Position in the arena frame (m).
    pub position: Vec3,
    /// Linear velocity (m/s).
    pub velocity: Vec3,
    /// Orientation (unit quaternion, scalar first).
    pub orientation: Quaternion,
    /// Angular velocity (rad/s).
    pub twist: Vec3,
}

impl VehicleState {
    /// A vehicle hovering at `position`: zero velocity and twist,
    /// identity orientation.
    pub fn at_rest(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Linear speed (m/s).
    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    /// Angular rate magnitude (rad/s).
    pub fn angular_rate(&self) -> f64 {
        self.twist.norm()
    }

    /// Heading derived from the orientation.
    pub fn yaw(&self) -> f64 {
        self.orientation.yaw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_rest_has_no_motion() {
        let s = VehicleState::at_rest(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(s.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(s.speed(), 0.0);
        assert_eq!(s.angular_rate(), 0.0);
        assert_eq!(s.orientation, Quaternion::IDENTITY);
    }

    #[test]
    fn speed_is_velocity_norm() {
        let s = VehicleState {
            velocity: Vec3::new(3.0, 4.0, 0.0),
            twist: Vec3::new(0.0, 0.0, 2.0),
            ..VehicleState::default()
        };
        assert!((s.speed() - 5.0).abs() < 1e-12);
        assert!((s.angular_rate() - 2.0).abs() < 1e-12);
    }
}
