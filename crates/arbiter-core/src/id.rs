//! Strongly-typed identifiers.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Identifies one vehicle under coordination.
///
/// Keys are registered once at setup and stay stable for the run.
/// Backed by `Arc<str>` so that cloning a key into every store, status
/// table, and per-cycle snapshot is a reference-count bump.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentKey(Arc<str>);

impl AgentKey {
    /// Create a key from any string-like value.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgentKey({:?})", &*self.0)
    }
}

impl fmt::Display for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentKey {
    fn from(v: &str) -> Self {
        Self::new(v)
    }
}

impl From<String> for AgentKey {
    fn from(v: String) -> Self {
        Self(Arc::from(v))
    }
}

impl Borrow<str> for AgentKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AgentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Monotonically increasing arbitration cycle counter.
///
/// Incremented once per pass of the arbitration engine over all agents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CycleId(pub u64);

impl CycleId {
    /// The cycle after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CycleId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
