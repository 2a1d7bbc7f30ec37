//! Watchdog status records and their aggregation.
//!
//! Each watchdog owns a [`StatusTable`]: a [`Warden`] of
//! [`StatusEntry`] keyed by agent, so consumers can poll with `read` or
//! block on status changes with `await_next`. [`SafetySummary`] is the
//! aggregation contract over both tables.

use std::fmt;

use arbiter_core::AgentKey;
use arbiter_warden::Warden;
use indexmap::IndexMap;

/// Per-agent status table written by a watchdog.
pub type StatusTable = Warden<StatusEntry>;

/// Coarse status of one agent as seen by one watchdog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StatusFlag {
    /// Not yet evaluated, or the agent's data could not be read.
    #[default]
    Unknown,
    /// Everything within bounds.
    Nominal,
    /// A state-legality violation.
    Violation,
    /// The agent's updated trajectory is missing or not refreshed.
    Stale,
}

impl StatusFlag {
    /// Ordering for aggregation: higher is worse.
    pub fn severity(self) -> u8 {
        match self {
            Self::Nominal => 0,
            Self::Unknown => 1,
            Self::Stale => 2,
            Self::Violation => 3,
        }
    }

    /// The worse of two flags.
    pub fn worst(self, other: Self) -> Self {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for StatusFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Nominal => "nominal",
            Self::Violation => "violation",
            Self::Stale => "stale",
        })
    }
}

/// Why a status entry is not nominal.
#[derive(Clone, Debug, PartialEq)]
pub enum StatusReason {
    /// The vehicle is outside the map's free space.
    OutsideFreeSpace,
    /// Velocity magnitude beyond the envelope (m/s).
    SpeedExceeded(f64),
    /// Angular rate beyond the envelope (rad/s).
    AngularRateExceeded(f64),
    /// The agent's state or trajectory could not be read.
    StateUnavailable,
    /// The updated trajectory slot has never been written.
    NeverWritten,
    /// The updated trajectory is older than the staleness window.
    Stale {
        /// Age of the last write, in milliseconds.
        age_ms: u64,
    },
}

impl fmt::Display for StatusReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutsideFreeSpace => write!(f, "outside free space"),
            Self::SpeedExceeded(v) => write!(f, "speed {v:.2} m/s exceeds envelope"),
            Self::AngularRateExceeded(v) => write!(f, "angular rate {v:.2} rad/s exceeds envelope"),
            Self::StateUnavailable => write!(f, "state unavailable"),
            Self::NeverWritten => write!(f, "never written"),
            Self::Stale { age_ms } => write!(f, "last written {age_ms} ms ago"),
        }
    }
}

/// One status record: flag, optional reason, and the clock time it was
/// recorded at (s since UNIX epoch).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusEntry {
    /// Coarse status.
    pub flag: StatusFlag,
    /// Detail for non-nominal entries.
    pub reason: Option<StatusReason>,
    /// When the entry was recorded.
    pub at: f64,
}

impl StatusEntry {
    /// A nominal entry.
    pub fn nominal(at: f64) -> Self {
        Self {
            flag: StatusFlag::Nominal,
            reason: None,
            at,
        }
    }

    /// A non-nominal entry.
    pub fn raised(flag: StatusFlag, reason: StatusReason, at: f64) -> Self {
        Self {
            flag,
            reason: Some(reason),
            at,
        }
    }

    /// Whether the flag is [`StatusFlag::Nominal`].
    pub fn is_nominal(&self) -> bool {
        self.flag == StatusFlag::Nominal
    }
}

// ── SafetySummary ──────────────────────────────────────────────────

/// Both watchdogs' view of one agent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AgentSafety {
    /// Entry from the state watchdog's table.
    pub state: StatusEntry,
    /// Entry from the trajectory watchdog's table.
    pub trajectory: StatusEntry,
}

impl AgentSafety {
    /// The worse of the two flags.
    pub fn worst(&self) -> StatusFlag {
        self.state.flag.worst(self.trajectory.flag)
    }
}

/// Snapshot of both status tables, per agent.
///
/// An agent missing from one table, or whose entry cannot be read,
/// shows an [`StatusFlag::Unknown`] entry for that side. No escalation
/// policy is applied; this is the input an escalation component would
/// consume.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SafetySummary {
    agents: IndexMap<AgentKey, AgentSafety>,
}

impl SafetySummary {
    /// Read both tables. Agents appear in state-table order, followed
    /// by any only known to the trajectory table.
    pub fn collect(state_table: &StatusTable, trajectory_table: &StatusTable) -> Self {
        let mut agents: IndexMap<AgentKey, AgentSafety> = IndexMap::new();
        for key in state_table.keys() {
            let entry = state_table.read(&key).unwrap_or_default();
            agents.entry(key).or_default().state = entry;
        }
        for key in trajectory_table.keys() {
            let entry = trajectory_table.read(&key).unwrap_or_default();
            agents.entry(key).or_default().trajectory = entry;
        }
        Self { agents }
    }

    /// Both entries for `key`.
    pub fn get(&self, key: &AgentKey) -> Option<&AgentSafety> {
        self.agents.get(key)
    }

    /// Worst flag for `key`.
    pub fn worst(&self, key: &AgentKey) -> Option<StatusFlag> {
        self.agents.get(key).map(AgentSafety::worst)
    }

    /// Whether every agent is nominal on both sides.
    pub fn all_nominal(&self) -> bool {
        self.agents
            .values()
            .all(|a| a.worst() == StatusFlag::Nominal)
    }

    /// Agents with a non-nominal worst flag, with that flag.
    pub fn flagged(&self) -> impl Iterator<Item = (&AgentKey, StatusFlag)> {
        self.agents
            .iter()
            .map(|(k, a)| (k, a.worst()))
            .filter(|(_, f)| *f != StatusFlag::Nominal)
    }

    /// Number of agents in the summary.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the summary covers no agents.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
