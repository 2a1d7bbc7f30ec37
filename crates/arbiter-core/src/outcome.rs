//! Arbitration outcomes reported back to trajectory producers.
//!
//! Legality and collision failures are data, not errors: they drive
//! trajectory correction and are handed to the producer so it can adapt
//! its next proposal.

use std::fmt;

use smallvec::SmallVec;

use crate::id::{AgentKey, CycleId};

/// Which constraint a trajectory violated.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// Declared sample velocity exceeds the configured maximum.
    MaxVelocityExceeded,
    /// Declared sample acceleration exceeds the configured maximum.
    MaxAccelerationExceeded,
    /// Gap between consecutive timestamps exceeds the configured maximum.
    TimeBetweenSamplesExceedsMax,
    /// Sample position lies outside the map's free space.
    SampleOutsideFreeSpace,
    /// A timestamp is not strictly greater than its predecessor.
    NonMonotonicTime,
    /// The projected separation to another agent drops below the
    /// configured minimum.
    MinimumSeparation {
        /// The agent this trajectory conflicts with.
        other: AgentKey,
    },
}

impl ViolationKind {
    /// Short stable name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MaxVelocityExceeded => "max_velocity_exceeded",
            Self::MaxAccelerationExceeded => "max_acceleration_exceeded",
            Self::TimeBetweenSamplesExceedsMax => "time_between_samples_exceeds_max",
            Self::SampleOutsideFreeSpace => "sample_outside_free_space",
            Self::NonMonotonicTime => "non_monotonic_time",
            Self::MinimumSeparation { .. } => "minimum_separation",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinimumSeparation { other } => write!(f, "minimum separation to '{other}'"),
            other => f.write_str(other.name()),
        }
    }
}

/// A structured constraint violation: what failed, the offending
/// numeric value, and the first sample index at which it occurs.
#[derive(Clone, Debug, PartialEq)]
pub struct Violation {
    /// The violated constraint.
    pub kind: ViolationKind,
    /// The offending value (speed, acceleration, gap, separation, or
    /// timestamp, depending on `kind`).
    pub value: f64,
    /// Index of the first offending sample.
    pub index: usize,
}

impl Violation {
    /// Construct a violation.
    pub fn new(kind: ViolationKind, value: f64, index: usize) -> Self {
        Self { kind, value, index }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (value {}) at sample {}", self.kind, self.value, self.index)
    }
}

/// At most one violation per checker category.
pub type Violations = SmallVec<[Violation; 5]>;

/// Why arbitration rejected a trajectory outright.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// The agent is already inside another agent's safety bubble while
    /// holding position; no truncation can restore separation.
    Unresolvable,
    /// No proposal and no previously published trajectory: the agent
    /// was held at its current position.
    EmptyProposal,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolvable => write!(f, "conflict cannot be resolved by holding"),
            Self::EmptyProposal => write!(f, "no trajectory proposed"),
        }
    }
}

/// Outcome attached 1:1 to a trajectory written by the arbitration engine.
#[derive(Clone, Debug, PartialEq)]
pub enum ResultCode {
    /// The proposal was forwarded unchanged.
    Success,
    /// The proposal violated a constraint and was replaced by a
    /// truncate-and-hold correction.
    ConstraintViolation(Violation),
    /// The proposal could not be arbitrated; a hold was published.
    Rejected(RejectReason),
}

impl ResultCode {
    /// Whether this is [`ResultCode::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// The violation, if any.
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Self::ConstraintViolation(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::ConstraintViolation(v) => write!(f, "constraint violation: {v}"),
            Self::Rejected(r) => write!(f, "rejected: {r}"),
        }
    }
}

impl From<Result<(), Violation>> for ResultCode {
    fn from(r: Result<(), Violation>) -> Self {
        match r {
            Ok(()) => Self::Success,
            Err(v) => Self::ConstraintViolation(v),
        }
    }
}

/// A result code tagged with the cycle that produced it and the
/// generation of the proposal it judged (0 = no proposal yet).
#[derive(Clone, Debug, PartialEq)]
pub struct Verdict {
    /// Arbitration cycle that produced this verdict.
    pub cycle: CycleId,
    /// Store generation of the proposal that was judged.
    pub proposal_generation: u64,
    /// The outcome.
    pub code: ResultCode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_code_from_check() {
        assert!(ResultCode::from(Ok(())).is_success());
        let v = Violation::new(ViolationKind::MaxVelocityExceeded, 9.0, 3);
        let code = ResultCode::from(Err(v.clone()));
        assert!(!code.is_success());
        assert_eq!(code.violation(), Some(&v));
    }

    #[test]
    fn display_names_the_other_agent() {
        let v = Violation::new(
            ViolationKind::MinimumSeparation {
                other: AgentKey::new("blue"),
            },
            0.25,
            7,
        );
        let s = ResultCode::ConstraintViolation(v).to_string();
        assert!(s.contains("'blue'"), "{s}");
        assert!(s.contains("sample 7"), "{s}");
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(ViolationKind::NonMonotonicTime.name(), "non_monotonic_time");
        assert_eq!(
            ViolationKind::MinimumSeparation {
                other: AgentKey::new("x")
            }
            .name(),
            "minimum_separation"
        );
    }
}
