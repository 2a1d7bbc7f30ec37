//! Loop and system configuration, validation, and error types.
//!
//! Configuration is supplied once at startup. [`MediatorConfig::validate`]
//! checks every structural invariant before any store is created or
//! thread spawned.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use arbiter_core::{AgentKey, Vec3, WardenError};
use arbiter_vetter::KinematicLimits;
use indexmap::IndexSet;

/// Longest accepted loop period.
pub const MAX_PERIOD: Duration = Duration::from_secs(60);

// ── ArbitrationConfig ──────────────────────────────────────────────

/// Configuration for the [`ArbitrationEngine`](crate::ArbitrationEngine).
#[derive(Clone, Debug, PartialEq)]
pub struct ArbitrationConfig {
    /// Cycle period. Default: 50 ms.
    pub period: Duration,
    /// Minimum separation between any two agents (m). Default: 0.5.
    pub min_separation: f64,
    /// Kinematic limits for the authoritative legality check.
    pub limits: KinematicLimits,
    /// Capacity of the outbound dispatch channel. Default: 64.
    pub outbox_capacity: usize,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(50),
            min_separation: 0.5,
            limits: KinematicLimits::default(),
            outbox_capacity: 64,
        }
    }
}

impl ArbitrationConfig {
    /// Check the arbitration settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_period("arbitration", self.period)?;
        if !self.min_separation.is_finite() || self.min_separation <= 0.0 {
            return Err(ConfigError::InvalidSeparation {
                value: self.min_separation,
            });
        }
        if let Some((name, value)) = self.limits.first_invalid() {
            return Err(ConfigError::InvalidLimit { name, value });
        }
        if self.outbox_capacity == 0 {
            return Err(ConfigError::OutboxCapacityZero);
        }
        Ok(())
    }
}

// ── Watchdog configs ───────────────────────────────────────────────

/// Kinematic envelope audited by the [`StateWatchdog`](crate::StateWatchdog).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KinematicEnvelope {
    /// Maximum velocity magnitude (m/s). Default: 6.0.
    pub max_speed: f64,
    /// Maximum angular rate magnitude (rad/s). Default: 10.0.
    pub max_angular_rate: f64,
}

impl Default for KinematicEnvelope {
    fn default() -> Self {
        Self {
            max_speed: 6.0,
            max_angular_rate: 10.0,
        }
    }
}

/// Configuration for the [`StateWatchdog`](crate::StateWatchdog).
#[derive(Clone, Debug, PartialEq)]
pub struct StateWatchdogConfig {
    /// Cycle period. Default: 100 ms.
    pub period: Duration,
    /// Envelope each state is checked against.
    pub envelope: KinematicEnvelope,
}

impl Default for StateWatchdogConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(100),
            envelope: KinematicEnvelope::default(),
        }
    }
}

impl StateWatchdogConfig {
    /// Check the state watchdog settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_period("state_watchdog", self.period)?;
        for (name, value) in [
            ("max_speed", self.envelope.max_speed),
            ("max_angular_rate", self.envelope.max_angular_rate),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidLimit { name, value });
            }
        }
        Ok(())
    }
}

/// Configuration for the [`TrajectoryWatchdog`](crate::TrajectoryWatchdog).
#[derive(Clone, Debug, PartialEq)]
pub struct TrajectoryWatchdogConfig {
    /// Cycle period. Default: 100 ms.
    pub period: Duration,
    /// Age past which an updated trajectory counts as stale. Default: 500 ms.
    pub staleness_window: Duration,
}

impl Default for TrajectoryWatchdogConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(100),
            staleness_window: Duration::from_millis(500),
        }
    }
}

impl TrajectoryWatchdogConfig {
    /// Check the trajectory watchdog settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_period("trajectory_watchdog", self.period)?;
        if self.staleness_window.is_zero() {
            return Err(ConfigError::InvalidStalenessWindow);
        }
        Ok(())
    }
}

// ── MediatorConfig ─────────────────────────────────────────────────

/// One agent to register, with the position it is seeded at.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentSpec {
    /// The agent's key.
    pub key: AgentKey,
    /// Position the agent starts at, at rest.
    pub initial_position: Vec3,
}

impl AgentSpec {
    /// Agent `key` starting at rest at `initial_position`.
    pub fn new(key: impl Into<AgentKey>, initial_position: Vec3) -> Self {
        Self {
            key: key.into(),
            initial_position,
        }
    }
}

/// Everything [`Mediator::start`](crate::Mediator::start) needs.
#[derive(Clone, Debug, PartialEq)]
pub struct MediatorConfig {
    /// Agents registered in every store before any loop starts.
    pub agents: Vec<AgentSpec>,
    /// Arbitration engine settings.
    pub arbitration: ArbitrationConfig,
    /// State watchdog settings.
    pub state_watchdog: StateWatchdogConfig,
    /// Trajectory watchdog settings.
    pub trajectory_watchdog: TrajectoryWatchdogConfig,
}

impl MediatorConfig {
    /// Default loop settings for the given agents.
    pub fn new(agents: Vec<AgentSpec>) -> Self {
        Self {
            agents,
            arbitration: ArbitrationConfig::default(),
            state_watchdog: StateWatchdogConfig::default(),
            trajectory_watchdog: TrajectoryWatchdogConfig::default(),
        }
    }

    /// Check all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agents.is_empty() {
            return Err(ConfigError::NoAgents);
        }
        let mut seen = IndexSet::with_capacity(self.agents.len());
        for spec in &self.agents {
            if !seen.insert(&spec.key) {
                return Err(ConfigError::DuplicateAgent(spec.key.clone()));
            }
            if !spec.initial_position.is_finite() {
                return Err(ConfigError::InvalidInitialPosition(spec.key.clone()));
            }
        }
        self.arbitration.validate()?;
        self.state_watchdog.validate()?;
        self.trajectory_watchdog.validate()?;
        Ok(())
    }

    /// Agent keys in configuration order.
    pub fn keys(&self) -> impl Iterator<Item = &AgentKey> {
        self.agents.iter().map(|a| &a.key)
    }
}

fn check_period(loop_name: &'static str, period: Duration) -> Result<(), ConfigError> {
    if period.is_zero() || period > MAX_PERIOD {
        return Err(ConfigError::InvalidPeriod { loop_name, period });
    }
    Ok(())
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during validation or system assembly.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// No agents configured.
    NoAgents,
    /// The same key appears twice in the agent list.
    DuplicateAgent(AgentKey),
    /// An agent's initial position is not finite.
    InvalidInitialPosition(AgentKey),
    /// A loop period is zero or longer than [`MAX_PERIOD`].
    InvalidPeriod {
        /// Which loop.
        loop_name: &'static str,
        /// The rejected period.
        period: Duration,
    },
    /// Minimum separation is not finite and positive.
    InvalidSeparation {
        /// The rejected value.
        value: f64,
    },
    /// A kinematic limit or envelope bound is not finite and positive.
    InvalidLimit {
        /// Which limit.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// The outbound dispatch channel capacity is zero.
    OutboxCapacityZero,
    /// The trajectory staleness window is zero.
    InvalidStalenessWindow,
    /// Store setup failed.
    Warden(WardenError),
    /// A loop thread could not be spawned.
    ThreadSpawnFailed {
        /// Description of which thread failed.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAgents => write!(f, "no agents configured"),
            Self::DuplicateAgent(k) => write!(f, "agent '{k}' configured twice"),
            Self::InvalidInitialPosition(k) => {
                write!(f, "agent '{k}' has a non-finite initial position")
            }
            Self::InvalidPeriod { loop_name, period } => {
                write!(
                    f,
                    "{loop_name} period must be in (0, {MAX_PERIOD:?}], got {period:?}"
                )
            }
            Self::InvalidSeparation { value } => {
                write!(f, "min_separation must be finite and positive, got {value}")
            }
            Self::InvalidLimit { name, value } => {
                write!(f, "{name} must be finite and positive, got {value}")
            }
            Self::OutboxCapacityZero => write!(f, "outbox_capacity must be at least 1"),
            Self::InvalidStalenessWindow => write!(f, "staleness_window must be non-zero"),
            Self::Warden(e) => write!(f, "store: {e}"),
            Self::ThreadSpawnFailed { reason } => write!(f, "thread spawn failed: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Warden(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WardenError> for ConfigError {
    fn from(e: WardenError) -> Self {
        Self::Warden(e)
    }
}
