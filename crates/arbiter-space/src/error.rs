//! Error types for region and map construction.

use std::error::Error;
use std::fmt;

/// Errors from building or inflating regions.
#[derive(Clone, Debug, PartialEq)]
pub enum SpaceError {
    /// A plane normal was zero or non-finite.
    DegeneratePlane,
    /// A ball radius was negative or non-finite.
    InvalidRadius {
        /// The rejected radius.
        value: f64,
    },
    /// An inflation distance was negative or non-finite.
    InvalidDistance {
        /// The rejected distance.
        value: f64,
    },
    /// Box corners were not ordered `min <= max` on every axis.
    InvertedBounds,
    /// Shrinking the boundary left no interior.
    EmptyRegion,
}

impl fmt::Display for SpaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegeneratePlane => write!(f, "plane normal must be finite and non-zero"),
            Self::InvalidRadius { value } => {
                write!(f, "radius must be finite and >= 0, got {value}")
            }
            Self::InvalidDistance { value } => {
                write!(f, "inflation distance must be finite and >= 0, got {value}")
            }
            Self::InvertedBounds => write!(f, "box min corner exceeds max corner"),
            Self::EmptyRegion => write!(f, "region has no interior after shrinking"),
        }
    }
}

impl Error for SpaceError {}
